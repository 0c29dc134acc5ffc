#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use safecalc_lib::{
    emergency::{EmergencyConfig, EmergencyController, EmergencyEvent},
    models::{EmergencyContact, LocationSample},
    providers::{ContactNotifier, LocationProvider, Platform, RecordingHandle, RecordingProvider},
    settings::{SettingsStore, UserSettings},
};

pub const CODE: &str = "9999";

pub fn settings_with_contacts(count: usize) -> Arc<SettingsStore> {
    let contacts = (0..count)
        .map(|i| {
            EmergencyContact::new(&format!("Contact {i}"), &format!("555-01{i:02}"), None, i == 0)
                .unwrap()
        })
        .collect();

    Arc::new(SettingsStore::in_memory(UserSettings {
        setup_complete: true,
        deactivation_code: CODE.into(),
        trigger_sequence: "1234".into(),
        contacts,
        owner_name: "Alex".into(),
        owner_phone: "555-0199".into(),
    }))
}

#[derive(Default)]
pub struct FixedLocation;

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_location(&self) -> Result<LocationSample> {
        Ok(LocationSample {
            latitude: 48.8584,
            longitude: 2.2945,
            accuracy: 5.0,
            captured_at: Utc::now(),
            resolved_address: None,
        })
    }

    async fn resolve_address(&self, _sample: &LocationSample) -> Result<Option<String>> {
        Ok(Some("Champ de Mars, Paris".into()))
    }
}

pub struct FailingLocation;

#[async_trait]
impl LocationProvider for FailingLocation {
    async fn current_location(&self) -> Result<LocationSample> {
        Err(anyhow!("location permission denied"))
    }
}

/// Never produces a fix within any reasonable timeout.
pub struct StalledLocation;

#[async_trait]
impl LocationProvider for StalledLocation {
    async fn current_location(&self) -> Result<LocationSample> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(anyhow!("gave up"))
    }
}

/// Counts how often capture starts and stops.
#[derive(Default)]
pub struct CountingRecorder {
    pub startup_delay: Duration,
    pub fail: bool,
    pub begun: AtomicUsize,
    pub ended: AtomicUsize,
}

impl CountingRecorder {
    pub fn slow(startup_delay: Duration) -> Self {
        Self {
            startup_delay,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn begun(&self) -> usize {
        self.begun.load(Ordering::SeqCst)
    }

    pub fn ended(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordingProvider for CountingRecorder {
    async fn begin_recording(&self) -> Result<RecordingHandle> {
        if !self.startup_delay.is_zero() {
            tokio::time::sleep(self.startup_delay).await;
        }
        if self.fail {
            return Err(anyhow!("camera in use"));
        }
        self.begun.fetch_add(1, Ordering::SeqCst);
        Ok(RecordingHandle::new())
    }

    async fn end_recording(&self, _handle: RecordingHandle) -> Result<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingNotifier {
    pub alerted: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn names(&self) -> Vec<String> {
        self.alerted.lock().unwrap().clone()
    }
}

impl ContactNotifier for CollectingNotifier {
    fn notify(&self, contact: &EmergencyContact, _owner_name: &str) {
        self.alerted.lock().unwrap().push(contact.name.clone());
    }
}

pub struct Harness {
    pub controller: EmergencyController,
    pub recorder: Arc<CountingRecorder>,
    pub notifier: Arc<CollectingNotifier>,
}

pub fn harness(contacts: usize) -> Harness {
    harness_with(
        contacts,
        Arc::new(FixedLocation),
        Arc::new(CountingRecorder::default()),
    )
}

pub fn harness_with(
    contacts: usize,
    location: Arc<dyn LocationProvider>,
    recorder: Arc<CountingRecorder>,
) -> Harness {
    let notifier = Arc::new(CollectingNotifier::default());
    let platform = Platform::new(location, recorder.clone(), notifier.clone());
    let controller = EmergencyController::new(settings_with_contacts(contacts), platform)
        .with_config(EmergencyConfig::default());

    Harness {
        controller,
        recorder,
        notifier,
    }
}

/// Lets spawned session tasks run without moving far along the clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub fn drain(events: &mut tokio::sync::broadcast::Receiver<EmergencyEvent>) -> Vec<EmergencyEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
