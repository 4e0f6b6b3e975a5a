//! Shared receiver state: the feed slot table and completed-transfer history.
//!
//! Both live behind one mutex so a slot choice, the slot update, and the
//! history append happen as a single critical section. Nothing in here is
//! held across an `.await`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::ConfigError;
use crate::imaging::{DecodedImage, ImageKind};
use crate::slots::{FeedSlotTable, SlotChoice};

/// Metadata for one successful transfer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRecord {
    pub identity: String,
    pub filename: String,
    pub path: PathBuf,
    pub completed_at: DateTime<Local>,
    pub bytes: usize,
    /// Hex BLAKE3 digest of the reconstructed bytes.
    pub blake3: String,
}

impl TransferRecord {
    pub fn new(identity: &str, filename: &str, path: PathBuf, bytes: &[u8]) -> Self {
        Self {
            identity: identity.to_string(),
            filename: filename.to_string(),
            path,
            completed_at: Local::now(),
            bytes: bytes.len(),
            blake3: blake3::hash(bytes).to_hex().to_string(),
        }
    }
}

/// What a slot shows right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub index: usize,
    pub identity: Option<String>,
    pub image: Option<ImageSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageSummary {
    pub width: u32,
    pub height: u32,
    pub kind: ImageKind,
    pub bytes: usize,
}

impl From<&DecodedImage> for ImageSummary {
    fn from(image: &DecodedImage) -> Self {
        Self {
            width: image.width,
            height: image.height,
            kind: image.kind,
            bytes: image.encoded.len(),
        }
    }
}

struct DashboardState {
    slots: FeedSlotTable<DecodedImage>,
    history: Vec<TransferRecord>,
}

pub struct Dashboard {
    state: Mutex<DashboardState>,
}

impl Dashboard {
    pub fn new(slot_count: usize, preferred: HashMap<String, usize>) -> Result<Self, ConfigError> {
        Ok(Self {
            state: Mutex::new(DashboardState {
                slots: FeedSlotTable::new(slot_count, preferred)?,
                history: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Place `image` in a feed slot for `identity`.
    pub fn publish(&self, identity: &str, image: DecodedImage) -> SlotChoice {
        self.lock().slots.assign(identity, image)
    }

    /// Append to the completed-transfer history.
    pub fn record(&self, record: TransferRecord) {
        self.lock().history.push(record);
    }

    /// Slot update and history append under one lock.
    pub fn complete_transfer(&self, record: TransferRecord, image: DecodedImage) -> SlotChoice {
        let mut state = self.lock();
        let choice = state.slots.assign(&record.identity, image);
        state.history.push(record);
        choice
    }

    pub fn slot_count(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn snapshot(&self) -> Vec<SlotView> {
        self.lock()
            .slots
            .slots()
            .iter()
            .enumerate()
            .map(|(index, slot)| SlotView {
                index,
                identity: slot.assignment.identity().map(str::to_string),
                image: slot.last_image.as_ref().map(ImageSummary::from),
            })
            .collect()
    }

    /// Completed transfers, oldest first.
    pub fn history(&self) -> Vec<TransferRecord> {
        self.lock().history.clone()
    }

    pub fn completed_count(&self) -> usize {
        self.lock().history.len()
    }
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Dashboard")
            .field("slots", &state.slots.len())
            .field("completed", &state.history.len())
            .finish()
    }
}
