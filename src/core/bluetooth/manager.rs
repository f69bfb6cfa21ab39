//! Printer manager
//! This module owns the single process-wide printer session. Every read
//! and mutation of session state goes through `PrinterManager`; nothing
//! else holds the radio link.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

use crate::config::{LinkSettings, PrinterConfig};
use crate::core::bluetooth::backend::{BleAdapter, BleLink};
use crate::core::bluetooth::commands::{PrintJob, encode_body, encode_cut};
use crate::core::bluetooth::fragmenter::Fragmenter;
use crate::core::bluetooth::keepalive::KeepAliveMonitor;
use crate::core::bluetooth::negotiator::negotiate;
use crate::core::bluetooth::reconnect::RestoreOutcome;
use crate::core::bluetooth::types::{
    CharacteristicRef, ConnectionSession, PeripheralHandle, SavedPrinterRecord, SessionEvent,
};
use crate::error::{PrinterError, PrinterResult};
use crate::storage::PrinterStore;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Represents the state of a successfully connected printer.
/// This struct holds the active handles needed for interaction.
#[derive(Clone)]
struct ActiveSession {
    generation: u64,
    peripheral: PeripheralHandle,
    characteristic: CharacteristicRef,
    link: Arc<dyn BleLink>,
    /// Cancelled when the session ends; stops the heartbeat and any transfer.
    cancel: CancellationToken,
}

/// The session cell plus a counter bumped on every install and removal,
/// so background loops can tell their session was replaced.
pub struct SessionSlot {
    current: RwLock<Option<ActiveSession>>,
    generation: AtomicU64,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone)]
struct LinkOptions {
    settings: LinkSettings,
    heartbeat: Vec<u8>,
}

impl LinkOptions {
    fn from_config(config: &PrinterConfig) -> Self {
        Self {
            settings: config.link.sanitized(),
            heartbeat: config.heartbeat_bytes(),
        }
    }
}

/// Manages the printer connection
pub struct PrinterManager {
    adapter: Arc<dyn BleAdapter>,
    store: PrinterStore,
    options: RwLock<LinkOptions>,
    slot: Arc<SessionSlot>,
    /// Serializes connect and disconnect
    lifecycle: Mutex<()>,
    /// Serializes writes; tokio's mutex is fair so sends go out in arrival order
    write_gate: Arc<Mutex<()>>,
    /// Peers found by the last scan
    candidates: RwLock<Vec<PeripheralHandle>>,
    events: broadcast::Sender<SessionEvent>,
}

impl PrinterManager {
    pub fn new(adapter: Arc<dyn BleAdapter>, store: PrinterStore, config: &PrinterConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            adapter,
            store,
            options: RwLock::new(LinkOptions::from_config(config)),
            slot: Arc::new(SessionSlot::new()),
            lifecycle: Mutex::new(()),
            write_gate: Arc::new(Mutex::new(())),
            candidates: RwLock::new(Vec::new()),
            events,
        }
    }

    /// Picks up new pacing and heartbeat settings for later connects and sends.
    pub async fn apply_config(&self, config: &PrinterConfig) {
        *self.options.write().await = LinkOptions::from_config(config);
        info!("Printer link settings updated.");
    }

    pub async fn link_settings(&self) -> LinkSettings {
        self.options.read().await.settings.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn candidates(&self) -> Vec<PeripheralHandle> {
        self.candidates.read().await.clone()
    }

    /// Runs one discovery window and replaces the candidate list.
    pub async fn scan(&self) -> PrinterResult<Vec<PeripheralHandle>> {
        let window = self.link_settings().await.scan_duration();
        let found = self.adapter.scan(window).await?;
        if found.is_empty() {
            info!("Scan finished without finding any printer.");
        }
        *self.candidates.write().await = found.clone();
        Ok(found)
    }

    pub fn stop_scan(&self) {
        self.adapter.stop_scan();
    }

    /// Connects to a peer by identity, using the scanned name when known.
    pub async fn connect_by_id(&self, device_id: &str) -> PrinterResult<ConnectionSession> {
        let peripheral = self
            .candidates()
            .await
            .into_iter()
            .find(|p| p.id == device_id)
            .unwrap_or_else(|| PeripheralHandle::new(device_id, "Unknown"));
        self.connect(&peripheral).await
    }

    /// Connects, negotiates and installs the session, replacing any
    /// existing one first.
    pub async fn connect(&self, peripheral: &PeripheralHandle) -> PrinterResult<ConnectionSession> {
        self.connect_within(peripheral, None).await
    }

    /// Like `connect`, with the radio work bounded by `limit`.
    pub async fn connect_within(
        &self,
        peripheral: &PeripheralHandle,
        limit: Option<Duration>,
    ) -> PrinterResult<ConnectionSession> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.teardown().await.is_some() {
            info!("Previous session released before connecting to {}", peripheral.id);
        }
        self.open_session(peripheral, limit).await
    }

    /// Reconnects to the saved printer unless it was forgotten or another
    /// session got installed first. The record and the slot are checked
    /// under the lifecycle lock, so a concurrent `disconnect` or `connect`
    /// either finishes before this looks or waits until it is done.
    pub async fn restore_saved(&self) -> PrinterResult<RestoreOutcome> {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(record) = self.store.saved_printer().await? else {
            info!("No saved printer, skipping reconnect.");
            return Ok(RestoreOutcome::NoSavedPrinter);
        };
        if self.slot.current.read().await.is_some() {
            debug!("Printer session already present, skipping reconnect.");
            return Ok(RestoreOutcome::AlreadyConnected);
        }

        let limit = self.link_settings().await.reconnect_timeout();
        info!(
            "Reconnecting to saved printer {} ({}) within {:?}",
            record.name, record.id, limit
        );
        let session = self
            .open_session(&PeripheralHandle::from(&record), Some(limit))
            .await?;
        info!("Saved printer {} restored.", record.id);
        Ok(RestoreOutcome::Restored(session))
    }

    /// Opens, negotiates and installs a session. Callers hold `lifecycle`
    /// and have already cleared the slot.
    async fn open_session(
        &self,
        peripheral: &PeripheralHandle,
        limit: Option<Duration>,
    ) -> PrinterResult<ConnectionSession> {
        let (link, characteristic) = self.open_and_negotiate(peripheral, limit).await?;

        let options = self.options.read().await.clone();
        let session = {
            let mut current = self.slot.current.write().await;
            let session = ActiveSession {
                generation: self.slot.bump(),
                peripheral: peripheral.clone(),
                characteristic,
                link: link.clone(),
                cancel: CancellationToken::new(),
            };
            *current = Some(session.clone());
            session
        };

        if let Err(e) = self
            .store
            .save_printer(&SavedPrinterRecord::from(peripheral))
            .await
        {
            error!("Connected, but failed to persist printer identity: {}", e);
        }

        KeepAliveMonitor {
            link: link.clone(),
            characteristic,
            heartbeat: options.heartbeat,
            interval: options.settings.keepalive_interval(),
            generation: session.generation,
            slot: Arc::downgrade(&self.slot),
            write_gate: self.write_gate.clone(),
            cancel: session.cancel.child_token(),
        }
        .start();

        let _ = self.events.send(SessionEvent::Connected(peripheral.clone()));
        info!(
            "Printer {} ({}) connected, session {}",
            peripheral.name, peripheral.id, session.generation
        );

        Ok(ConnectionSession {
            peripheral: peripheral.clone(),
            characteristic,
            live: true,
        })
    }

    /// Stops the heartbeat, releases the link, and forgets the printer.
    /// The only path that deletes the saved printer record.
    pub async fn disconnect(&self) -> PrinterResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        match self.teardown().await {
            Some(session) => info!("Disconnected from {}", session.peripheral.id),
            None => info!("No printer session to disconnect."),
        }
        self.store.clear_saved_printer().await?;
        let _ = self.events.send(SessionEvent::Disconnected);
        Ok(())
    }

    /// Drops the in-memory session on process teardown. The saved printer
    /// survives so the next start can restore it.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if let Some(session) = self.teardown().await {
            info!("Released printer {} for shutdown", session.peripheral.id);
        }
    }

    /// Read-only status. Never mutates the session.
    pub async fn current_session(&self) -> Option<ConnectionSession> {
        let session = self.slot.current.read().await.clone()?;
        let live = session.link.is_connected().await;
        Some(ConnectionSession {
            peripheral: session.peripheral,
            characteristic: session.characteristic,
            live,
        })
    }

    pub async fn is_connected(&self) -> bool {
        matches!(self.current_session().await, Some(session) if session.live)
    }

    /// Streams one job to the printer. Concurrent callers are queued in
    /// arrival order; nothing interleaves. Never reconnects on its own.
    pub async fn send(&self, job: &PrintJob) -> PrinterResult<()> {
        let _gate = self.write_gate.lock().await;

        let Some(session) = self.slot.current.read().await.clone() else {
            return Err(PrinterError::Disconnected);
        };
        if session.cancel.is_cancelled() {
            return Err(PrinterError::Disconnected);
        }
        if !session.link.is_connected().await {
            self.mark_lost(&session).await;
            return Err(PrinterError::Disconnected);
        }

        let settings = self.link_settings().await;
        let fragmenter = Fragmenter::new(settings.max_chunk_size, settings.chunk_delay());
        let result = self.transmit_job(&session, &fragmenter, job).await;

        let Err(e) = result else {
            info!(
                "Print job of {} byte(s) sent to {}",
                job.payload.len(),
                session.peripheral.id
            );
            return Ok(());
        };

        if !e.is_link_loss() && session.link.is_connected().await {
            warn!("Print failed, link still up: {}", e);
            return Err(e);
        }
        warn!("Print failed, link lost: {}", e);
        self.mark_lost(&session).await;
        Err(PrinterError::Disconnected)
    }

    async fn transmit_job(
        &self,
        session: &ActiveSession,
        fragmenter: &Fragmenter,
        job: &PrintJob,
    ) -> PrinterResult<()> {
        let link = session.link.as_ref();
        fragmenter
            .transmit(link, &session.characteristic, &encode_body(job), &session.cancel)
            .await?;

        if job.cut_requested {
            tokio::select! {
                _ = sleep(fragmenter.delay()) => {}
                _ = session.cancel.cancelled() => return Err(PrinterError::Disconnected),
            }
            fragmenter
                .transmit(link, &session.characteristic, &encode_cut(job.cut_mode), &session.cancel)
                .await?;
        }
        Ok(())
    }

    async fn open_and_negotiate(
        &self,
        peripheral: &PeripheralHandle,
        limit: Option<Duration>,
    ) -> PrinterResult<(Arc<dyn BleLink>, CharacteristicRef)> {
        info!("Connecting to {} ({})...", peripheral.name, peripheral.id);
        let started = tokio::time::Instant::now();

        let link = match limit {
            Some(limit) => timeout(limit, self.adapter.connect(peripheral))
                .await
                .map_err(|_| PrinterError::Timeout(limit))?,
            None => self.adapter.connect(peripheral).await,
        }
        .map_err(|e| match e {
            PrinterError::Disconnected => {
                PrinterError::LinkFailure("peer dropped while connecting".into())
            }
            other => other,
        })?;

        info!("Connection successful, discovering services...");
        let negotiated = match limit {
            Some(limit) => {
                let remaining = limit.saturating_sub(started.elapsed());
                timeout(remaining, negotiate(link.as_ref()))
                    .await
                    .unwrap_or(Err(PrinterError::Timeout(limit)))
            }
            None => negotiate(link.as_ref()).await,
        };

        match negotiated {
            Ok(characteristic) => Ok((link, characteristic)),
            Err(e) => {
                warn!("Negotiation with {} failed: {}", peripheral.id, e);
                if let Err(de) = link.disconnect().await {
                    warn!("Failed to release {} after negotiation: {}", peripheral.id, de);
                }
                if e == PrinterError::NoWritableCharacteristic {
                    self.candidates
                        .write()
                        .await
                        .retain(|c| c.id != peripheral.id);
                }
                Err(e)
            }
        }
    }

    /// Removes the session from the slot, stops its loops and releases the
    /// radio link. Leaves the saved printer alone.
    async fn teardown(&self) -> Option<ActiveSession> {
        let session = {
            let mut current = self.slot.current.write().await;
            let session = current.take()?;
            self.slot.bump();
            session
        };
        session.cancel.cancel();
        if let Err(e) = session.link.disconnect().await {
            warn!("Failed to release link to {}: {}", session.peripheral.id, e);
        }
        Some(session)
    }

    /// Clears `session` if it is still the installed one and reports the
    /// loss. The saved printer is kept for reconnection.
    async fn mark_lost(&self, session: &ActiveSession) {
        {
            let mut current = self.slot.current.write().await;
            match current.as_ref() {
                Some(installed) if installed.generation == session.generation => {
                    *current = None;
                    self.slot.bump();
                }
                _ => return,
            }
        }
        session.cancel.cancel();
        warn!("Lost link to printer {}", session.peripheral.id);
        let _ = self.events.send(SessionEvent::Lost(session.peripheral.clone()));
    }
}
