mod common;

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use pretty_assertions::assert_eq;

use common::{harness, settings_with_contacts, CODE};
use safecalc_lib::{
    app::{App, AppInput, AppMode, AppOutcome},
    calculator::ButtonToken,
    db::Database,
    emergency::{DeactivationOutcome, EmergencyConfig, EmergencyController},
    models::{EmergencyContact, IncidentStatus},
    providers::Platform,
    settings::{SettingsStore, SetupDraft, UserSettings},
};

fn calculator_app() -> App {
    let settings = settings_with_contacts(1);
    let emergency = EmergencyController::new(settings.clone(), Platform::simulated());
    App::new(settings, emergency)
}

async fn type_keys(app: &mut App, keys: &str) -> Vec<AppOutcome> {
    let mut outcomes = Vec::new();
    for key in keys.chars() {
        let token = ButtonToken::from_key(key).expect("calculator key");
        outcomes.push(app.handle(AppInput::Button(token)).await);
    }
    outcomes
}

fn triggered(outcomes: &[AppOutcome]) -> bool {
    outcomes
        .iter()
        .any(|outcome| matches!(outcome, AppOutcome::EmergencyActivated(_)))
}

#[tokio::test(start_paused = true)]
async fn secret_sequence_activates_on_its_last_key() {
    let mut app = calculator_app();
    let outcomes = type_keys(&mut app, "1234").await;

    assert!(outcomes[..3]
        .iter()
        .all(|outcome| matches!(outcome, AppOutcome::Display(_))));
    assert!(matches!(outcomes[3], AppOutcome::EmergencyActivated(_)));
    assert_eq!(app.mode(), AppMode::Emergency);
}

#[tokio::test(start_paused = true)]
async fn secret_matches_the_tail_of_longer_input() {
    let mut app = calculator_app();
    assert!(triggered(&type_keys(&mut app, "51234").await));
}

#[tokio::test(start_paused = true)]
async fn near_misses_leave_the_calculator_alone() {
    let mut app = calculator_app();
    assert!(!triggered(&type_keys(&mut app, "12354").await));
    assert!(!triggered(&type_keys(&mut app, "1+2+3+4").await));
    assert_eq!(app.mode(), AppMode::Calculator);
    assert!(!app.emergency().is_active().await);
}

fn fresh_app() -> App {
    let settings = Arc::new(SettingsStore::in_memory(UserSettings::default()));
    let emergency = EmergencyController::new(settings.clone(), Platform::simulated());
    App::new(settings, emergency)
}

fn draft(trigger: &str) -> SetupDraft {
    SetupDraft {
        trigger_sequence: trigger.into(),
        deactivation_code: CODE.into(),
        confirm_code: CODE.into(),
        contacts: vec![EmergencyContact::new("Sam", "555-0100", None, false).unwrap()],
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn trigger_typed_with_key_aliases_fires_after_setup() {
    let mut app = fresh_app();
    app.complete_setup(draft("12*4")).unwrap();
    assert_eq!(app.settings().trigger_sequence(), "12×4");

    assert!(triggered(&type_keys(&mut app, "12*4").await));
    assert_eq!(app.mode(), AppMode::Emergency);
}

#[tokio::test(start_paused = true)]
async fn setup_refuses_triggers_that_could_never_fire() {
    let mut app = fresh_app();
    assert!(app.complete_setup(draft("ab12")).is_err());
    assert!(app.complete_setup(draft("12345678901")).is_err());
    assert_eq!(app.mode(), AppMode::Setup);
    assert!(!app.settings().is_setup_complete());

    app.complete_setup(draft("1234567890")).unwrap();
    assert!(triggered(&type_keys(&mut app, "1234567890").await));
}

#[tokio::test(start_paused = true)]
async fn arithmetic_is_undisturbed_until_the_trigger() {
    let mut app = calculator_app();
    type_keys(&mut app, "2+3*4=").await;
    assert_eq!(app.display(), "20");
    assert_eq!(app.clear_label(), "C");

    type_keys(&mut app, "c").await;
    assert_eq!(app.display(), "0");
    assert_eq!(app.clear_label(), "AC");
}

#[tokio::test(start_paused = true)]
async fn full_emergency_round_trip() {
    let mut app = calculator_app();
    type_keys(&mut app, "1234").await;
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(app.emergency().snapshot().await.escalation_level, 2);

    assert!(matches!(
        app.handle(AppInput::DecoyRequested).await,
        AppOutcome::Decoy(_)
    ));
    assert!(matches!(
        app.handle(AppInput::Deactivate("1111".into())).await,
        AppOutcome::DeactivationRejected(ref snapshot) if snapshot.escalation_level == 3
    ));

    let outcome = app.handle(AppInput::Deactivate(CODE.into())).await;
    assert!(matches!(
        outcome,
        AppOutcome::Deactivated(ref last) if last.elapsed_seconds == 31 && last.decoy_used
    ));
    assert_eq!(app.mode(), AppMode::Calculator);

    assert!(!triggered(&type_keys(&mut app, "4").await));
    assert!(triggered(&type_keys(&mut app, "1234").await));
}

#[tokio::test]
async fn sessions_are_journaled() {
    let dir = std::env::temp_dir().join(format!("safecalc-flow-{}", uuid::Uuid::new_v4()));
    let db = Database::new(dir.join("incidents.sqlite3")).unwrap();

    let h = harness(2);
    let controller = h
        .controller
        .with_config(EmergencyConfig {
            tick_interval: Duration::from_millis(20),
            escalation_interval: Duration::from_secs(3600),
            contact_delay: Duration::from_millis(10),
            location_timeout: Duration::from_secs(1),
            journal_every_ticks: 1,
        })
        .with_journal(db.clone());

    controller.activate().await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(db.get_incomplete_incidents().await.unwrap().len(), 1);

    assert!(matches!(
        controller.attempt_deactivation("0000").await,
        DeactivationOutcome::Rejected(_)
    ));
    assert!(matches!(
        controller.attempt_deactivation(CODE).await,
        DeactivationOutcome::Deactivated(_)
    ));

    let incidents = db.list_incidents(5).await.unwrap();
    assert_eq!(incidents.len(), 1);
    let incident = &incidents[0];
    assert_eq!(incident.status, IncidentStatus::Resolved);
    assert_eq!(incident.peak_escalation, 2);
    assert!(incident.ended_at.is_some());
    assert!(incident.latitude.is_some());
    assert!(db.get_incomplete_incidents().await.unwrap().is_empty());

    drop(controller);
    drop(db);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn unfinished_sessions_are_recovered_as_interrupted() {
    let dir = std::env::temp_dir().join(format!("safecalc-recover-{}", uuid::Uuid::new_v4()));
    let path = dir.join("incidents.sqlite3");

    {
        let db = Database::new(path.clone()).unwrap();
        let h = harness(1);
        let controller = h.controller.with_journal(db.clone());
        controller.activate().await;
    }

    let db = Database::new(path).unwrap();
    assert_eq!(db.recover_incomplete_incidents(Utc::now()).await.unwrap(), 1);
    let incidents = db.list_incidents(5).await.unwrap();
    assert_eq!(incidents[0].status, IncidentStatus::Interrupted);

    drop(db);
    let _ = std::fs::remove_dir_all(dir);
}
