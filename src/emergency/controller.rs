use std::sync::Arc;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    db::Database,
    error::SafetyError,
    models::{EmergencyContact, IncidentRecord, IncidentStatus, LocationSample},
    providers::{Platform, RecordingHandle},
    settings::SettingsStore,
};

use super::alerts::alert_loop;
use super::{EmergencyConfig, EmergencyEvent, EmergencySession, EmergencySnapshot, SessionWarning};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub enum DeactivationOutcome {
    /// Correct code. Carries the final state of the ended session.
    Deactivated(EmergencySnapshot),
    /// Wrong code. The session escalated one level.
    Rejected(EmergencySnapshot),
    /// Nothing to deactivate.
    NotActive,
}

/// Everything a live session owns besides its state. Released in one place,
/// on successful deactivation.
#[derive(Default)]
struct SessionWorkers {
    elapsed_ticker: Option<JoinHandle<()>>,
    escalation_ticker: Option<JoinHandle<()>>,
    location: Option<JoinHandle<()>>,
    alerts: Option<(CancellationToken, JoinHandle<()>)>,
    recording: Option<RecordingHandle>,
}

/// Drives the hidden emergency mode.
///
/// Every transition takes the `state` lock, so transitions never interleave.
/// When both locks are needed, `state` is taken before `workers`.
#[derive(Clone)]
pub struct EmergencyController {
    state: Arc<Mutex<EmergencySession>>,
    workers: Arc<Mutex<SessionWorkers>>,
    settings: Arc<SettingsStore>,
    platform: Platform,
    config: EmergencyConfig,
    journal: Option<Database>,
    events: broadcast::Sender<EmergencyEvent>,
}

impl EmergencyController {
    pub fn new(settings: Arc<SettingsStore>, platform: Platform) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(EmergencySession::new())),
            workers: Arc::new(Mutex::new(SessionWorkers::default())),
            settings,
            platform,
            config: EmergencyConfig::default(),
            journal: None,
            events,
        }
    }

    pub fn with_config(mut self, config: EmergencyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_journal(mut self, journal: Database) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EmergencyEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> EmergencySnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn is_active(&self) -> bool {
        self.state.lock().await.is_active()
    }

    /// Starts a session. Location, recording and contact alerts are kicked off
    /// independently; none of them can fail activation. Calling this while a
    /// session is live returns the current state unchanged.
    pub async fn activate(&self) -> EmergencySnapshot {
        let settings = self.settings.snapshot();

        let snapshot = {
            let mut state = self.state.lock().await;
            if state.is_active() {
                return state.snapshot();
            }

            let session_id = Uuid::new_v4().to_string();
            let contacts_total = u32::try_from(settings.contacts.len()).unwrap_or(u32::MAX);
            state.begin(session_id.clone(), Utc::now(), contacts_total);

            let mut workers = self.workers.lock().await;
            workers.elapsed_ticker = Some(self.spawn_elapsed_ticker(session_id.clone()));
            workers.escalation_ticker = Some(self.spawn_escalation_ticker(session_id.clone()));
            workers.location = Some(self.spawn_location(session_id.clone()));
            workers.alerts = Some(self.spawn_alerts(
                session_id.clone(),
                settings.contacts,
                settings.owner_name,
            ));
            // Left detached: a handle that arrives after the session ended is
            // released by `on_recording_started`.
            self.spawn_recording(session_id);

            state.snapshot()
        };

        info!(
            "Emergency session {} activated ({} contacts)",
            snapshot.session_id.as_deref().unwrap_or("?"),
            snapshot.contacts_total
        );

        if let Some(db) = &self.journal {
            if let Some(record) = incident_from(&snapshot, IncidentStatus::Active, Utc::now()) {
                if let Err(err) = db.insert_incident(&record).await {
                    error!("Failed to journal incident start: {err:?}");
                }
            }
        }

        self.emit(EmergencyEvent::StateChanged {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    /// Fake power-off: jumps to the maximum level and shows the decoy while
    /// everything keeps running.
    pub async fn feign_power_off(&self) -> Result<EmergencySnapshot, SafetyError> {
        let (snapshot, changed) = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return Err(SafetyError::NotActive);
            }
            let changed = state.feign_power_off();
            (state.snapshot(), changed)
        };

        if changed {
            warn!("Power off requested during emergency; escalating to maximum");
            self.emit(EmergencyEvent::Escalated {
                level: snapshot.escalation_level,
                description: snapshot.escalation_description.clone(),
            });
            self.emit(EmergencyEvent::StateChanged {
                snapshot: snapshot.clone(),
            });
            self.journal_progress(&snapshot);
        }

        Ok(snapshot)
    }

    /// Checks `candidate` against the stored deactivation code. A match ends
    /// the session and releases its resources; a mismatch escalates.
    pub async fn attempt_deactivation(&self, candidate: &str) -> DeactivationOutcome {
        let (last, workers) = {
            let mut state = self.state.lock().await;
            if !state.is_active() {
                return DeactivationOutcome::NotActive;
            }

            if !self.settings.verify_code(candidate) {
                let changed = state.escalate();
                let snapshot = state.snapshot();
                drop(state);

                warn!(
                    "Incorrect deactivation code; escalation now level {}",
                    snapshot.escalation_level
                );
                if changed {
                    self.emit(EmergencyEvent::Escalated {
                        level: snapshot.escalation_level,
                        description: snapshot.escalation_description.clone(),
                    });
                    self.journal_progress(&snapshot);
                }
                self.emit(EmergencyEvent::DeactivationRejected {
                    snapshot: snapshot.clone(),
                });
                return DeactivationOutcome::Rejected(snapshot);
            }

            let last = state.finish().snapshot();
            let workers = std::mem::take(&mut *self.workers.lock().await);
            (last, workers)
        };

        self.release_workers(workers).await;

        info!(
            "Emergency session {} deactivated after {}s at level {}",
            last.session_id.as_deref().unwrap_or("?"),
            last.elapsed_seconds,
            last.escalation_level
        );

        if let Some(db) = &self.journal {
            let now = Utc::now();
            if let Some(record) = incident_from(&last, IncidentStatus::Active, now) {
                if let Err(err) = db.update_incident_progress(&record).await {
                    error!("Failed to journal final progress: {err:?}");
                }
                if let Err(err) = db
                    .mark_incident_status(&record.id, IncidentStatus::Resolved, Some(now), now)
                    .await
                {
                    error!("Failed to journal incident resolution: {err:?}");
                }
            }
        }

        self.emit(EmergencyEvent::Deactivated {
            snapshot: last.clone(),
        });
        self.emit(EmergencyEvent::StateChanged {
            snapshot: self.snapshot().await,
        });

        DeactivationOutcome::Deactivated(last)
    }

    fn spawn_elapsed_ticker(&self, session_id: String) -> JoinHandle<()> {
        let controller = self.clone();
        let period = self.config.tick_interval;
        let journal_every = self.config.journal_every_ticks.max(1);

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;

                let snapshot = {
                    let mut state = controller.state.lock().await;
                    if !state.is_current(&session_id) {
                        break;
                    }
                    state.tick();
                    state.snapshot()
                };

                if snapshot.elapsed_seconds % journal_every == 0 {
                    controller.journal_progress(&snapshot);
                }
                controller.emit(EmergencyEvent::Heartbeat { snapshot });
            }
        })
    }

    fn spawn_escalation_ticker(&self, session_id: String) -> JoinHandle<()> {
        let controller = self.clone();
        let period = self.config.escalation_interval;

        tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;

                let (snapshot, changed) = {
                    let mut state = controller.state.lock().await;
                    if !state.is_current(&session_id) {
                        break;
                    }
                    let changed = state.escalate();
                    (state.snapshot(), changed)
                };

                if changed {
                    info!(
                        "Session {} escalated to level {}",
                        session_id, snapshot.escalation_level
                    );
                    controller.emit(EmergencyEvent::Escalated {
                        level: snapshot.escalation_level,
                        description: snapshot.escalation_description.clone(),
                    });
                    controller.journal_progress(&snapshot);
                    controller.emit(EmergencyEvent::StateChanged {
                        snapshot: snapshot.clone(),
                    });
                }

                if snapshot.urgent {
                    break;
                }
            }
        })
    }

    fn spawn_alerts(
        &self,
        session_id: String,
        contacts: Vec<EmergencyContact>,
        owner_name: String,
    ) -> (CancellationToken, JoinHandle<()>) {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(alert_loop(
            self.clone(),
            session_id,
            contacts,
            owner_name,
            self.config.contact_delay,
            cancel_token.clone(),
        ));
        (cancel_token, handle)
    }

    fn spawn_location(&self, session_id: String) -> JoinHandle<()> {
        let controller = self.clone();
        let limit = self.config.location_timeout;

        tokio::spawn(async move {
            let provider = controller.platform.location.clone();

            let sample = match time::timeout(limit, provider.current_location()).await {
                Ok(Ok(sample)) => sample,
                Ok(Err(err)) => {
                    controller
                        .on_acquisition_failed(&session_id, SessionWarning::LocationUnavailable, err)
                        .await;
                    return;
                }
                Err(_) => {
                    let err = anyhow!("no location fix within {}s", limit.as_secs());
                    controller
                        .on_acquisition_failed(&session_id, SessionWarning::LocationUnavailable, err)
                        .await;
                    return;
                }
            };

            if !controller.on_location(&session_id, sample.clone()).await {
                return;
            }
            if sample.resolved_address.is_some() {
                return;
            }

            match time::timeout(limit, provider.resolve_address(&sample)).await {
                Ok(Ok(Some(address))) => controller.on_address(&session_id, address).await,
                Ok(Ok(None)) => {}
                Ok(Err(err)) => warn!("Address lookup failed: {err:?}"),
                Err(_) => warn!("Address lookup timed out after {}s", limit.as_secs()),
            }
        })
    }

    fn spawn_recording(&self, session_id: String) {
        let controller = self.clone();

        tokio::spawn(async move {
            match controller.platform.recorder.begin_recording().await {
                Ok(handle) => controller.on_recording_started(&session_id, handle).await,
                Err(err) => {
                    controller
                        .on_acquisition_failed(&session_id, SessionWarning::RecordingUnavailable, err)
                        .await
                }
            }
        });
    }

    /// Counts one alert for the live session. Returns false once the session
    /// is gone or every contact has been alerted.
    pub(super) async fn notify_contact(
        &self,
        session_id: &str,
        contact: &EmergencyContact,
        owner_name: &str,
    ) -> bool {
        let (notified, total) = {
            let mut state = self.state.lock().await;
            if !state.is_current(session_id) || !state.note_contact_notified() {
                return false;
            }
            self.platform.notifier.notify(contact, owner_name);
            (state.contacts_notified, state.contacts_total)
        };

        self.emit(EmergencyEvent::ContactNotified {
            name: contact.name.clone(),
            notified,
            total,
        });
        true
    }

    async fn on_location(&self, session_id: &str, sample: LocationSample) -> bool {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.is_current(session_id) {
                return false;
            }
            state.attach_location(sample);
            state.snapshot()
        };

        info!("Location captured for session {session_id}");
        self.journal_progress(&snapshot);
        self.emit(EmergencyEvent::StateChanged { snapshot });
        true
    }

    async fn on_address(&self, session_id: &str, address: String) {
        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.is_current(session_id) {
                return;
            }
            state.attach_address(address);
            state.snapshot()
        };

        self.journal_progress(&snapshot);
        self.emit(EmergencyEvent::StateChanged { snapshot });
    }

    async fn on_recording_started(&self, session_id: &str, handle: RecordingHandle) {
        let mut state = self.state.lock().await;
        if !state.is_current(session_id) {
            drop(state);
            info!("Recording {} arrived after session {session_id} ended", handle.id);
            self.release_recording(handle).await;
            return;
        }

        info!("Recording {} attached to session {session_id}", handle.id);
        self.workers.lock().await.recording = Some(handle);
        state.recording_active = true;
        let snapshot = state.snapshot();
        drop(state);

        self.emit(EmergencyEvent::StateChanged { snapshot });
    }

    async fn on_acquisition_failed(
        &self,
        session_id: &str,
        warning: SessionWarning,
        err: anyhow::Error,
    ) {
        warn!("{} for session {session_id}: {err:?}", warning.message());

        let snapshot = {
            let mut state = self.state.lock().await;
            if !state.is_current(session_id) || !state.warn(warning) {
                return;
            }
            state.snapshot()
        };

        self.emit(EmergencyEvent::Warning {
            warning,
            message: warning.message().to_string(),
        });
        self.emit(EmergencyEvent::StateChanged { snapshot });
    }

    async fn release_workers(&self, mut workers: SessionWorkers) {
        for task in [
            workers.elapsed_ticker.take(),
            workers.escalation_ticker.take(),
            workers.location.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }

        if let Some((cancel_token, handle)) = workers.alerts.take() {
            cancel_token.cancel();
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    error!("Alert worker failed: {err}");
                }
            }
        }

        if let Some(handle) = workers.recording.take() {
            self.release_recording(handle).await;
        }
    }

    async fn release_recording(&self, handle: RecordingHandle) {
        let recording_id = handle.id.clone();
        match self.platform.recorder.end_recording(handle).await {
            Ok(()) => info!("Recording {recording_id} released"),
            Err(err) => error!("Failed to release recording {recording_id}: {err:?}"),
        }
    }

    fn journal_progress(&self, snapshot: &EmergencySnapshot) {
        let Some(db) = self.journal.clone() else {
            return;
        };
        let Some(record) = incident_from(snapshot, IncidentStatus::Active, Utc::now()) else {
            return;
        };

        tokio::spawn(async move {
            if let Err(err) = db.update_incident_progress(&record).await {
                error!("Failed to journal incident progress: {err:?}");
            }
        });
    }

    fn emit(&self, event: EmergencyEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

fn incident_from(
    snapshot: &EmergencySnapshot,
    status: IncidentStatus,
    now: DateTime<Utc>,
) -> Option<IncidentRecord> {
    let id = snapshot.session_id.clone()?;
    let started_at = snapshot.started_at?;
    let location = snapshot.location.as_ref();

    Some(IncidentRecord {
        id,
        started_at,
        ended_at: None,
        status,
        peak_escalation: snapshot.escalation_level,
        elapsed_seconds: snapshot.elapsed_seconds,
        contacts_notified: snapshot.contacts_notified,
        decoy_used: snapshot.decoy_used,
        latitude: location.map(|l| l.latitude),
        longitude: location.map(|l| l.longitude),
        address: location.and_then(|l| l.resolved_address.clone()),
        created_at: started_at,
        updated_at: now,
    })
}
