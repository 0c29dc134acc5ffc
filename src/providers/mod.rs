pub mod location;
pub mod notifier;
pub mod recording;

use std::sync::Arc;

pub use location::{LocationProvider, SimulatedLocationProvider};
pub use notifier::{ContactNotifier, LogNotifier};
pub use recording::{RecordingHandle, RecordingProvider, SimulatedRecorder};

/// Device capabilities the emergency controller drives.
#[derive(Clone)]
pub struct Platform {
    pub location: Arc<dyn LocationProvider>,
    pub recorder: Arc<dyn RecordingProvider>,
    pub notifier: Arc<dyn ContactNotifier>,
}

impl Platform {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        recorder: Arc<dyn RecordingProvider>,
        notifier: Arc<dyn ContactNotifier>,
    ) -> Self {
        Self {
            location,
            recorder,
            notifier,
        }
    }

    pub fn simulated() -> Self {
        Self::new(
            Arc::new(SimulatedLocationProvider::default()),
            Arc::new(SimulatedRecorder::new()),
            Arc::new(LogNotifier),
        )
    }
}
