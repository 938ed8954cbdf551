use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use tracing::warn;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::{Role, User};

/// Process configuration, read from `ROOMSCHED_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub timetable_path: PathBuf,
    /// Optional JSON array of users registered at startup.
    pub users_path: Option<PathBuf>,
    /// Zone in which template times of day are interpreted.
    pub timezone: Tz,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub sync_refresh: Duration,
}

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|s| s.parse().ok())
}

impl Config {
    pub fn from_env() -> Result<Self, EngineError> {
        let tz_name = var("ROOMSCHED_TZ").unwrap_or_else(|| "Africa/Libreville".into());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| EngineError::Config(format!("unknown timezone {tz_name:?}")))?;

        Ok(Self {
            data_dir: var("ROOMSCHED_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            timetable_path: var("ROOMSCHED_TIMETABLE")
                .unwrap_or_else(|| "./timetable.json".into())
                .into(),
            users_path: var("ROOMSCHED_USERS").map(PathBuf::from),
            timezone,
            metrics_port: parsed("ROOMSCHED_METRICS_PORT"),
            compact_threshold: parsed("ROOMSCHED_COMPACT_THRESHOLD").unwrap_or(1000),
            sync_refresh: Duration::from_secs(parsed("ROOMSCHED_SYNC_REFRESH_SECS").unwrap_or(300)),
        })
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roomsched.wal")
    }
}

/// A user as listed in the startup file. Doctors are linked by name since
/// doctor ids only exist once the timetable has been synced.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub id: Ulid,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub pin: Option<String>,
    #[serde(default)]
    pub doctor: Option<String>,
}

impl UserEntry {
    pub fn to_user(&self, doctor_id: Option<Ulid>) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            pin: self.pin.clone(),
            doctor_id,
        }
    }
}

/// Parse the startup user list.
pub fn load_users(path: &std::path::Path) -> Result<Vec<UserEntry>, EngineError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&json).map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))
}

/// Register the startup users, skipping entries the store already holds.
/// Existing doctor links are kept for entries that still name a doctor, so a
/// restart does not unlink and relink them. Returns the number written.
pub async fn register_users(engine: &Engine, entries: &[UserEntry]) -> Result<usize, EngineError> {
    let mut written = 0;
    for entry in entries {
        let existing = engine.get_user(&entry.id).await;
        let doctor_id = match (&entry.doctor, &existing) {
            (Some(_), Some(user)) => user.doctor_id,
            _ => None,
        };
        let user = entry.to_user(doctor_id);
        if existing.as_ref() != Some(&user) {
            engine.register_user(user).await?;
            written += 1;
        }
    }
    Ok(written)
}

/// Link users to the doctors they name, once those doctors exist. Unknown
/// names are logged and left unlinked. Returns the number written.
pub async fn link_doctors(engine: &Engine, entries: &[UserEntry]) -> Result<usize, EngineError> {
    let mut written = 0;
    for entry in entries {
        let Some(name) = entry.doctor.as_deref() else {
            continue;
        };
        let Some(doctor) = engine.find_doctor_by_name(name).await else {
            warn!("user {} names unknown doctor {name:?}, left unlinked", entry.name);
            continue;
        };
        let user = entry.to_user(Some(doctor.id));
        if engine.get_user(&entry.id).await.as_ref() != Some(&user) {
            engine.register_user(user).await?;
            written += 1;
        }
    }
    Ok(written)
}
