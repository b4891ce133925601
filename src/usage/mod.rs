//! Best-effort usage ledger (cost and token counters)
//!
//! One [`UsageStore`] value is created by the caller and shared by reference;
//! `record` and `snapshot` are the only operations.

use crate::error::UsageError;
use crate::oracle::Usage;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rollup {
    pub calls: u64,
    #[serde(flatten)]
    pub usage: Usage,
}

impl Rollup {
    fn add(&mut self, usage: &Usage) {
        self.calls += 1;
        self.usage.add(usage);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub started_at: DateTime<Utc>,
    #[serde(flatten)]
    pub totals: Rollup,
}

impl Default for SessionCounters {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            totals: Rollup::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    /// Rollups keyed by local date (YYYY-MM-DD)
    #[serde(default)]
    pub days: BTreeMap<String, Rollup>,
    #[serde(default)]
    pub session: SessionCounters,
}

pub struct UsageStore {
    path: Option<PathBuf>,
    ledger: Mutex<Ledger>,
}

impl UsageStore {
    /// Store backed by `path`; prior daily rollups are kept, the session resets
    pub fn open(path: &Path) -> Self {
        let mut ledger = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Ledger>(&content).unwrap_or_else(|e| {
                warn!("Ignoring unreadable usage ledger {}: {}", path.display(), e);
                Ledger::default()
            }),
            Err(_) => Ledger::default(),
        };
        ledger.session = SessionCounters::default();
        Self {
            path: Some(path.to_path_buf()),
            ledger: Mutex::new(ledger),
        }
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record(&self, usage: &Usage) {
        let snapshot = {
            let mut ledger = self.lock();
            let day = Local::now().format("%Y-%m-%d").to_string();
            ledger.days.entry(day).or_default().add(usage);
            ledger.session.totals.add(usage);
            ledger.clone()
        };
        if let Some(path) = &self.path {
            if let Err(e) = persist(path, &snapshot) {
                warn!("Failed to update usage ledger: {}", e);
            } else {
                debug!("Usage ledger updated at {}", path.display());
            }
        }
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().clone()
    }
}

fn persist(path: &Path, ledger: &Ledger) -> Result<(), UsageError> {
    let write_err = |source| UsageError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(ledger)?;
    std::fs::write(path, json).map_err(write_err)
}

/// Read a ledger file without opening a session
pub fn read_ledger(path: &Path) -> Result<Ledger, UsageError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Ledger::default()),
        Err(source) => Err(UsageError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn usage(cost: f64, input: u64) -> Usage {
        Usage {
            cost_usd: cost,
            input_tokens: input,
            ..Default::default()
        }
    }

    #[test]
    fn test_record_and_snapshot() {
        let store = UsageStore::in_memory();
        store.record(&usage(0.5, 100));
        store.record(&usage(0.25, 50));

        let ledger = store.snapshot();
        assert_eq!(ledger.session.totals.calls, 2);
        assert_eq!(ledger.session.totals.usage.input_tokens, 150);
        assert_eq!(ledger.days.len(), 1);
        assert_eq!(ledger.days.values().next().unwrap().calls, 2);
    }

    #[test]
    fn test_persisted_days_survive_new_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("usage.json");

        let store = UsageStore::open(&path);
        store.record(&usage(1.0, 10));
        assert!(path.exists());

        let reopened = UsageStore::open(&path);
        let ledger = reopened.snapshot();
        assert_eq!(ledger.session.totals.calls, 0);
        assert_eq!(ledger.days.values().map(|r| r.calls).sum::<u64>(), 1);

        let read = read_ledger(&path).unwrap();
        assert_eq!(read.session.totals.calls, 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let store = std::sync::Arc::new(UsageStore::in_memory());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.record(&usage(0.1, 1)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().session.totals.calls, 4);
    }

    #[test]
    fn test_missing_ledger_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = read_ledger(&dir.path().join("none.json")).unwrap();
        assert!(ledger.days.is_empty());
    }
}
