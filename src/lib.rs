pub mod app;
pub mod calculator;
pub mod config;
pub mod console;
pub mod db;
pub mod emergency;
pub mod error;
pub mod models;
pub mod providers;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast,
};

use app::{App, AppMode, AppOutcome};
use config::AppConfig;
use console::{Command, HELP};
use db::Database;
use emergency::{EmergencyController, EmergencyEvent};
use providers::Platform;
use settings::SettingsStore;

const HISTORY_LIMIT: u32 = 10;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    info!("SafeCalc starting up...");

    let config = AppConfig::from_env();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run_console(config))
}

async fn run_console(config: AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

    let database = Database::new(config.journal_path())?;

    // Close out incidents that were live when the app last exited.
    let recovered = database.recover_incomplete_incidents(Utc::now()).await?;
    if recovered > 0 {
        warn!("Recovered {recovered} interrupted incident(s)");
    }

    let settings = Arc::new(SettingsStore::new(config.settings_path())?);
    let emergency = EmergencyController::new(settings.clone(), Platform::simulated())
        .with_config(config.emergency_config())
        .with_journal(database.clone());

    tokio::spawn(print_events(emergency.subscribe()));

    let mut app = App::new(settings, emergency);
    println!("{}", banner(&app));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match console::parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Keys(keys) => {
                let mut last = AppOutcome::Ignored;
                for key in keys {
                    last = app.handle(app::AppInput::Button(key)).await;
                    if app.mode() != AppMode::Calculator {
                        break;
                    }
                }
                print_outcome(&app, last);
            }
            Command::Input(input) => {
                let outcome = app.handle(input).await;
                print_outcome(&app, outcome);
            }
            Command::Setup(draft) => match app.complete_setup(draft) {
                Ok(()) => println!("{}", banner(&app)),
                Err(err) => println!("{err}"),
            },
            Command::AddContact(contact) => match app.add_contact(contact) {
                Ok(()) => println!("contact saved"),
                Err(err) => println!("{err}"),
            },
            Command::RemoveContact(id) => match app.remove_contact(&id) {
                Ok(()) => println!("contact removed"),
                Err(err) => println!("{err}"),
            },
            Command::SetTrigger(sequence) => match app.set_trigger_sequence(&sequence) {
                Ok(()) => println!("trigger updated"),
                Err(err) => println!("{err}"),
            },
            Command::ListContacts => {
                if !matches!(app.mode(), AppMode::Settings { unlocked: true }) {
                    println!("{}", error::SafetyError::Auth);
                    continue;
                }
                for contact in app.settings().contacts() {
                    let guardian = if contact.is_guardian { " (guardian)" } else { "" };
                    println!("{}  {} {}{}", contact.id, contact.name, contact.phone, guardian);
                }
            }
            Command::Status => {
                if app.mode() == AppMode::Emergency {
                    let snapshot = app.emergency().snapshot().await;
                    println!("{}", serde_json::to_string_pretty(&snapshot)?);
                } else {
                    println!("{}", banner(&app));
                }
            }
            Command::History => match database.list_incidents(HISTORY_LIMIT).await {
                Ok(incidents) => {
                    for incident in incidents {
                        println!(
                            "{}  {}  level {}  {}s  {} alerted",
                            incident.started_at.format("%Y-%m-%d %H:%M:%S"),
                            incident.status.as_str(),
                            incident.peak_escalation,
                            incident.elapsed_seconds,
                            incident.contacts_notified
                        );
                    }
                }
                Err(err) => log::error!("Failed to list incidents: {err:?}"),
            },
        }
    }

    if app.emergency().is_active().await {
        warn!("Exiting with an emergency session still active");
    }
    info!("SafeCalc shutting down");
    Ok(())
}

fn banner(app: &App) -> String {
    match app.mode() {
        AppMode::Setup => "setup required (type `help`)".to_string(),
        AppMode::Calculator => format!("[{}]  {}", app.clear_label(), app.display()),
        AppMode::Settings { unlocked } => {
            if unlocked {
                "settings (unlocked)".to_string()
            } else {
                "settings (locked): unlock <code>".to_string()
            }
        }
        AppMode::Emergency => "emergency mode".to_string(),
    }
}

fn print_outcome(app: &App, outcome: AppOutcome) {
    match outcome {
        AppOutcome::Display(_) | AppOutcome::ModeChanged(_) => println!("{}", banner(app)),
        AppOutcome::EmergencyActivated(snapshot) => println!(
            "EMERGENCY  level {}  {}",
            snapshot.escalation_level, snapshot.escalation_description
        ),
        AppOutcome::Decoy(screen) => println!("{}", screen.message),
        AppOutcome::DeactivationRejected(snapshot) => {
            println!("incorrect code  level {}", snapshot.escalation_level)
        }
        AppOutcome::Deactivated(last) => {
            println!("safe  ({} elapsed)", last.elapsed_display);
            println!("{}", banner(app));
        }
        AppOutcome::SettingsLocked => println!("{}", error::SafetyError::Auth),
        AppOutcome::Ignored => {}
    }
}

async fn print_events(mut events: broadcast::Receiver<EmergencyEvent>) {
    loop {
        match events.recv().await {
            Ok(EmergencyEvent::Escalated { level, description }) => {
                println!("level {level}: {description}")
            }
            Ok(EmergencyEvent::ContactNotified {
                name,
                notified,
                total,
            }) => println!("alerted {name} ({notified}/{total})"),
            Ok(EmergencyEvent::Warning { message, .. }) => println!("warning: {message}"),
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event printer skipped {skipped} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
