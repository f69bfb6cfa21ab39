//! Paced, chunked delivery of a byte stream to one characteristic.
//!
//! Thermal printers of this class have no flow control, so pacing between
//! chunks is the only backpressure. A failed chunk aborts the transfer;
//! whatever was already written stays written and the printer may emit a
//! partial receipt.

use std::time::Duration;

use log::{debug, warn};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::backend::BleLink;
use crate::core::bluetooth::types::CharacteristicRef;
use crate::error::{PrinterError, PrinterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragmenter {
    max_chunk: usize,
    delay: Duration,
}

impl Fragmenter {
    /// A zero chunk size is treated as one byte per write.
    pub fn new(max_chunk: usize, delay: Duration) -> Self {
        Self {
            max_chunk: max_chunk.max(1),
            delay,
        }
    }

    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The chunks `transmit` would write, in order.
    pub fn chunks<'a>(&self, bytes: &'a [u8]) -> std::slice::Chunks<'a, u8> {
        bytes.chunks(self.max_chunk)
    }

    /// Writes `bytes` strictly sequentially, awaiting each chunk and pausing
    /// between them. Cancelling `cancel` stops the transfer before the next
    /// chunk with `Disconnected`.
    pub async fn transmit(
        &self,
        link: &dyn BleLink,
        target: &CharacteristicRef,
        bytes: &[u8],
        cancel: &CancellationToken,
    ) -> PrinterResult<()> {
        let total = bytes.len().div_ceil(self.max_chunk);
        debug!(
            "Transmitting {} byte(s) in {} chunk(s) of at most {}",
            bytes.len(),
            total,
            self.max_chunk
        );

        for (index, chunk) in self.chunks(bytes).enumerate() {
            if index > 0 {
                tokio::select! {
                    _ = sleep(self.delay) => {}
                    _ = cancel.cancelled() => {
                        warn!("Transfer cancelled after {}/{} chunk(s)", index, total);
                        return Err(PrinterError::Disconnected);
                    }
                }
            }
            if cancel.is_cancelled() {
                return Err(PrinterError::Disconnected);
            }

            if let Err(e) = link.write(target, chunk).await {
                warn!("Chunk {}/{} failed: {}", index + 1, total, e);
                return Err(match e {
                    e if e.is_link_loss() => PrinterError::Disconnected,
                    PrinterError::WriteFailed(msg) => PrinterError::WriteFailed(msg),
                    other => PrinterError::WriteFailed(other.to_string()),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_reassemble_to_the_payload() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1_003).collect();
        for max in [1usize, 7, 20, 180, 512, 2_000] {
            let fragmenter = Fragmenter::new(max, Duration::ZERO);
            let chunks: Vec<&[u8]> = fragmenter.chunks(&payload).collect();
            assert!(chunks.iter().all(|c| c.len() <= max && !c.is_empty()));
            assert_eq!(chunks.concat(), payload);
        }
    }

    #[test]
    fn splits_at_the_chunk_boundary() {
        let payload = vec![0u8; 500];
        let sizes: Vec<usize> = Fragmenter::new(180, Duration::ZERO)
            .chunks(&payload)
            .map(<[u8]>::len)
            .collect();
        assert_eq!(sizes, vec![180, 180, 140]);
    }

    #[test]
    fn empty_payload_has_no_chunks() {
        assert_eq!(Fragmenter::new(180, Duration::ZERO).chunks(&[]).count(), 0);
    }

    #[test]
    fn zero_chunk_size_is_clamped() {
        assert_eq!(Fragmenter::new(0, Duration::ZERO).max_chunk(), 1);
    }
}
