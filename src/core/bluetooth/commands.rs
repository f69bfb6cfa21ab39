//! ESC/POS command vocabulary and print job encoding
//! This module contains every byte sequence sent to the printer.
//!
//! Encoding never fails: unknown settings fall back to documented defaults
//! because there is nobody at the printer to handle an error.

use serde::{Deserialize, Serialize};

use crate::config::PrinterConfig;

pub const ESC: u8 = 0x1B;
pub const GS: u8 = 0x1D;
pub const DLE: u8 = 0x10;
pub const EOT: u8 = 0x04;
pub const LF: u8 = 0x0A;

/// Lines fed before cutting so the last printed line clears the blade
pub const FEED_LINES_BEFORE_CUT: u8 = 3;

/// Horizontal alignment (ESC a n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Character size tiers (GS ! n). Unknown settings map to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FontSizeTier {
    #[default]
    Normal,
    /// Double height and width
    Double,
    /// Triple height and width
    Triple,
}

impl FontSizeTier {
    pub fn parse(setting: &str) -> Self {
        match setting.trim().to_ascii_lowercase().as_str() {
            "double" | "medium" | "large" | "2" => Self::Double,
            "triple" | "xlarge" | "extra-large" | "3" => Self::Triple,
            _ => Self::Normal,
        }
    }

    pub fn from_raw(tier: u8) -> Self {
        match tier {
            2 => Self::Double,
            3 => Self::Triple,
            _ => Self::Normal,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Double => "double",
            Self::Triple => "triple",
        }
    }
}

impl From<String> for FontSizeTier {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<FontSizeTier> for String {
    fn from(value: FontSizeTier) -> Self {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CutMode {
    #[default]
    Full,
    /// Leaves a small hinge so the receipt does not fall
    Partial,
}

impl From<String> for CutMode {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "partial" => Self::Partial,
            _ => Self::Full,
        }
    }
}

impl From<CutMode> for String {
    fn from(value: CutMode) -> Self {
        match value {
            CutMode::Full => "full".to_string(),
            CutMode::Partial => "partial".to_string(),
        }
    }
}

/// How receipt text is turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// One byte per char; anything above U+00FF becomes `?`
    Latin1,
    /// Anything outside 7-bit ASCII becomes `?`
    Ascii,
}

impl TextEncoding {
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl From<String> for TextEncoding {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "latin1" | "iso88591" | "windows1252" | "cp1252" => Self::Latin1,
            "ascii" | "usascii" => Self::Ascii,
            _ => Self::Utf8,
        }
    }
}

impl From<TextEncoding> for String {
    fn from(value: TextEncoding) -> Self {
        match value {
            TextEncoding::Utf8 => "utf8".to_string(),
            TextEncoding::Latin1 => "latin1".to_string(),
            TextEncoding::Ascii => "ascii".to_string(),
        }
    }
}

/// Printer commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterCommand {
    /// Reset formatting to power-on defaults (ESC @)
    Initialize,
    /// ESC a n
    Align(Alignment),
    /// ESC E n
    Bold(bool),
    /// GS ! n
    FontSize(FontSizeTier),
    /// LF
    LineFeed,
    /// Print buffer and feed n lines (ESC d n)
    Feed(u8),
    /// GS V 0 / GS V 1
    Cut(CutMode),
    /// Real-time status request (DLE EOT 1), never prints
    StatusQuery,
}

impl PrinterCommand {
    /// Convert the command to its byte representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Initialize => vec![ESC, b'@'],
            Self::Align(alignment) => {
                let n = match alignment {
                    Alignment::Left => 0,
                    Alignment::Center => 1,
                    Alignment::Right => 2,
                };
                vec![ESC, b'a', n]
            }
            Self::Bold(on) => vec![ESC, b'E', u8::from(*on)],
            Self::FontSize(tier) => {
                let n = match tier {
                    FontSizeTier::Normal => 0x00,
                    FontSizeTier::Double => 0x11,
                    FontSizeTier::Triple => 0x22,
                };
                vec![GS, b'!', n]
            }
            Self::LineFeed => vec![LF],
            Self::Feed(lines) => vec![ESC, b'd', *lines],
            Self::Cut(CutMode::Full) => vec![GS, b'V', 0x00],
            Self::Cut(CutMode::Partial) => vec![GS, b'V', 0x01],
            Self::StatusQuery => vec![DLE, EOT, 0x01],
        }
    }
}

/// A receipt as handed over by the receipt generator.
/// Unset fields fall back to the printer config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_cut: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_size: Option<FontSizeTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<TextEncoding>,
}

impl ReceiptPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One print request. Consumed once; retries belong to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintJob {
    pub payload: Vec<u8>,
    pub cut_requested: bool,
    pub cut_mode: CutMode,
    pub font_size: FontSizeTier,
    pub alignment: Alignment,
    pub bold: bool,
}

impl PrintJob {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            cut_requested: false,
            cut_mode: CutMode::default(),
            font_size: FontSizeTier::default(),
            alignment: Alignment::default(),
            bold: false,
        }
    }

    pub fn with_cut(mut self, mode: CutMode) -> Self {
        self.cut_requested = true;
        self.cut_mode = mode;
        self
    }

    pub fn with_font_size(mut self, tier: FontSizeTier) -> Self {
        self.font_size = tier;
        self
    }

    pub fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    /// Builds a job from a receipt. `auto_cut_enabled` in the config is a
    /// master switch; the receipt can only opt out of the cut. Size and
    /// encoding come from the receipt when set, else from the config.
    pub fn from_receipt(receipt: &ReceiptPayload, config: &PrinterConfig) -> Self {
        let encoding = receipt.encoding.unwrap_or(config.encoding);
        let job = Self::new(encoding.encode(&receipt.text))
            .with_font_size(receipt.text_size.unwrap_or(config.text_size));
        if config.auto_cut_enabled && receipt.auto_cut.unwrap_or(true) {
            job.with_cut(config.cut_mode)
        } else {
            job
        }
    }
}

/// Everything but the cut: formatting prefix, payload, trailing feed and
/// a size reset so the next job starts clean.
pub fn encode_body(job: &PrintJob) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(job.payload.len() + 16);
    bytes.extend(PrinterCommand::Initialize.to_bytes());
    bytes.extend(PrinterCommand::Align(job.alignment).to_bytes());
    bytes.extend(PrinterCommand::Bold(job.bold).to_bytes());
    bytes.extend(PrinterCommand::FontSize(job.font_size).to_bytes());
    bytes.extend_from_slice(&job.payload);
    bytes.extend(PrinterCommand::LineFeed.to_bytes());
    bytes.extend(PrinterCommand::FontSize(FontSizeTier::Normal).to_bytes());
    bytes
}

/// Feed past the cutter, then cut.
pub fn encode_cut(mode: CutMode) -> Vec<u8> {
    let mut bytes = PrinterCommand::Feed(FEED_LINES_BEFORE_CUT).to_bytes();
    bytes.extend(PrinterCommand::Cut(mode).to_bytes());
    bytes
}

/// Body followed by the cut when one was requested.
pub fn encode_job(job: &PrintJob) -> Vec<u8> {
    let mut bytes = encode_body(job);
    if job.cut_requested {
        bytes.extend(encode_cut(job.cut_mode));
    }
    bytes
}
