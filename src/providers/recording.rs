use std::{collections::HashSet, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use uuid::Uuid;

/// Opaque token for a running audio+video capture. Consumed by
/// [`RecordingProvider::end_recording`], so a handle can only be released once.
#[derive(Debug, PartialEq, Eq)]
pub struct RecordingHandle {
    pub id: String,
    pub started_at: DateTime<Utc>,
}

impl RecordingHandle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
        }
    }
}

impl Default for RecordingHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
pub trait RecordingProvider: Send + Sync {
    /// Starts combined audio and video capture.
    async fn begin_recording(&self) -> Result<RecordingHandle>;

    /// Stops capture and finalizes whatever was recorded.
    async fn end_recording(&self, handle: RecordingHandle) -> Result<()>;
}

/// Tracks open handles without touching any capture device.
#[derive(Default)]
pub struct SimulatedRecorder {
    open: Mutex<HashSet<String>>,
}

impl SimulatedRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open
            .lock()
            .map(|open| open.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordingProvider for SimulatedRecorder {
    async fn begin_recording(&self) -> Result<RecordingHandle> {
        let handle = RecordingHandle::new();
        self.open
            .lock()
            .map_err(|_| anyhow!("recorder state poisoned"))?
            .insert(handle.id.clone());
        info!("Simulated recording {} started", handle.id);
        Ok(handle)
    }

    async fn end_recording(&self, handle: RecordingHandle) -> Result<()> {
        let removed = self
            .open
            .lock()
            .map_err(|_| anyhow!("recorder state poisoned"))?
            .remove(&handle.id);
        if !removed {
            return Err(anyhow!("recording {} is not open", handle.id));
        }

        let seconds = (Utc::now() - handle.started_at).num_seconds().max(0);
        info!("Simulated recording {} finalized after {}s", handle.id, seconds);
        Ok(())
    }
}
