//! Append-only CSV trade journal.
//!
//! Every open and close lands here as one row. The header is written
//! exactly once, when the file is new or empty, so repeated runs append
//! to the same journal cleanly.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::TradeError;
use crate::models::TradeRecord;

/// Destination for trade records. The engine writes through this seam;
/// tests substitute an in-memory sink.
pub trait TradeSink: Send {
    fn append(&mut self, record: &TradeRecord) -> Result<(), TradeError>;
}

/// CSV journal row. Timestamps are local wall-clock time.
#[derive(Debug, Serialize)]
struct JournalRow<'a> {
    timestamp: String,
    symbol: &'a str,
    side: &'a str,
    action: &'a str,
    price: String,
    leverage: u32,
    pnl: String,
}

impl<'a> JournalRow<'a> {
    fn from_record(record: &'a TradeRecord) -> Self {
        Self {
            timestamp: record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            symbol: &record.symbol,
            side: record.side.as_str(),
            action: record.action.as_str(),
            price: record.price.to_string(),
            leverage: record.leverage,
            pnl: record.pnl.to_string(),
        }
    }
}

/// File-backed CSV sink.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn needs_header(&self) -> bool {
        match std::fs::metadata(&self.path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }
}

impl TradeSink for Journal {
    fn append(&mut self, record: &TradeRecord) -> Result<(), TradeError> {
        let write_header = self.needs_header();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TradeError::Journal(format!("open {}: {}", self.path.display(), e)))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);

        writer
            .serialize(JournalRow::from_record(record))
            .map_err(|e| TradeError::Journal(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| TradeError::Journal(e.to_string()))?;

        Ok(())
    }
}
