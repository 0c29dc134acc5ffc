use std::{
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use tokio::sync::oneshot;

mod migrations;

use crate::models::{IncidentRecord, IncidentStatus};
use migrations::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to journal thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join journal thread: {join_err:?}");
            }
        }
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

fn to_u64(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("value {value} is negative"))
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn status_from_str(value: &str) -> Result<IncidentStatus> {
    match value {
        "Active" => Ok(IncidentStatus::Active),
        "Resolved" => Ok(IncidentStatus::Resolved),
        "Interrupted" => Ok(IncidentStatus::Interrupted),
        _ => Err(anyhow!("unknown incident status '{value}'")),
    }
}

const INCIDENT_COLUMNS: &str = "id, started_at, ended_at, status, peak_escalation, elapsed_seconds,
     contacts_notified, decoy_used, latitude, longitude, address, created_at, updated_at";

fn incident_from_row(row: &Row<'_>) -> Result<IncidentRecord> {
    let peak: i64 = row.get(4)?;
    let contacts: i64 = row.get(6)?;
    Ok(IncidentRecord {
        id: row.get(0)?,
        started_at: parse_datetime(&row.get::<_, String>(1)?)?,
        ended_at: row
            .get::<_, Option<String>>(2)?
            .map(|s| parse_datetime(&s))
            .transpose()?,
        status: status_from_str(&row.get::<_, String>(3)?)?,
        peak_escalation: u8::try_from(peak)
            .map_err(|_| anyhow!("escalation {peak} out of range"))?,
        elapsed_seconds: to_u64(row.get::<_, i64>(5)?)?,
        contacts_notified: u32::try_from(contacts)
            .map_err(|_| anyhow!("contact count {contacts} out of range"))?,
        decoy_used: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
        address: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(12)?)?,
    })
}

/// SQLite journal of emergency sessions. All statements run on a dedicated
/// thread; async callers wait on a oneshot reply.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("safecalc-journal".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Journal initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Journal thread shutting down");
            })
            .with_context(|| "failed to spawn journal worker thread")?;

        ready_rx
            .recv()
            .context("journal worker exited before signaling readiness")??;

        info!("Incident journal opened at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Journal caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to journal thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("journal thread terminated unexpectedly"))?
    }

    pub async fn insert_incident(&self, incident: &IncidentRecord) -> Result<()> {
        let record = incident.clone();
        self.execute(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO incidents ({INCIDENT_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    record.id,
                    record.started_at.to_rfc3339(),
                    record.ended_at.map(|dt| dt.to_rfc3339()),
                    record.status.as_str(),
                    record.peak_escalation,
                    to_i64(record.elapsed_seconds)?,
                    record.contacts_notified,
                    record.decoy_used,
                    record.latitude,
                    record.longitude,
                    record.address,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert incident")?;
            Ok(())
        })
        .await
    }

    /// Refreshes the mutable columns of a running incident. Writes may land out
    /// of order, so counters only ever grow.
    pub async fn update_incident_progress(&self, incident: &IncidentRecord) -> Result<()> {
        let record = incident.clone();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE incidents
                 SET peak_escalation = MAX(peak_escalation, ?1),
                     elapsed_seconds = MAX(elapsed_seconds, ?2),
                     contacts_notified = MAX(contacts_notified, ?3),
                     decoy_used = MAX(decoy_used, ?4),
                     latitude = COALESCE(?5, latitude),
                     longitude = COALESCE(?6, longitude),
                     address = COALESCE(?7, address),
                     updated_at = ?8
                 WHERE id = ?9",
                params![
                    record.peak_escalation,
                    to_i64(record.elapsed_seconds)?,
                    record.contacts_notified,
                    record.decoy_used,
                    record.latitude,
                    record.longitude,
                    record.address,
                    record.updated_at.to_rfc3339(),
                    record.id,
                ],
            )
            .with_context(|| "failed to update incident progress")?;
            Ok(())
        })
        .await
    }

    pub async fn mark_incident_status(
        &self,
        incident_id: &str,
        status: IncidentStatus,
        ended_at: Option<DateTime<Utc>>,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let incident_id = incident_id.to_string();
        self.execute(move |conn| {
            conn.execute(
                "UPDATE incidents
                 SET status = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    status.as_str(),
                    ended_at.map(|dt| dt.to_rfc3339()),
                    updated_at.to_rfc3339(),
                    incident_id,
                ],
            )
            .with_context(|| "failed to update incident status")?;
            Ok(())
        })
        .await
    }

    pub async fn get_incomplete_incidents(&self) -> Result<Vec<IncidentRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INCIDENT_COLUMNS}
                 FROM incidents
                 WHERE status = 'Active'
                 ORDER BY started_at DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut incidents = Vec::new();
            while let Some(row) = rows.next()? {
                incidents.push(incident_from_row(row)?);
            }
            Ok(incidents)
        })
        .await
    }

    pub async fn list_incidents(&self, limit: u32) -> Result<Vec<IncidentRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INCIDENT_COLUMNS}
                 FROM incidents
                 ORDER BY started_at DESC
                 LIMIT ?1"
            ))?;

            let mut rows = stmt.query(params![limit])?;
            let mut incidents = Vec::new();
            while let Some(row) = rows.next()? {
                incidents.push(incident_from_row(row)?);
            }
            Ok(incidents)
        })
        .await
    }

    /// Marks incidents left active by a crash as interrupted. Returns how many
    /// were recovered.
    pub async fn recover_incomplete_incidents(&self, now: DateTime<Utc>) -> Result<usize> {
        let incomplete = self.get_incomplete_incidents().await?;
        for incident in &incomplete {
            log::warn!(
                "Recovered incomplete incident {}; marking as Interrupted",
                incident.id
            );
            self.mark_incident_status(&incident.id, IncidentStatus::Interrupted, Some(now), now)
                .await?;
        }
        Ok(incomplete.len())
    }
}
