//! Append-only event journal.
//!
//! One JSONL file per UTC day under `<data_dir>/journal/`. Every
//! decision the orchestrator makes (refresh, denial, fallback, sweep)
//! lands here so a day of behavior can be replayed from the log.
//! Journal failures are never fatal; we warn and keep serving.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use tracing::warn;

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

struct Inner {
    dir: PathBuf,
    day_key: String,
    file: File,
}

impl Inner {
    fn open_day_file(dir: &Path, day_key: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("events-{}.jsonl", day_key)))
    }

    fn rotate_if_needed(&mut self) -> std::io::Result<()> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if today != self.day_key {
            self.file = Self::open_day_file(&self.dir, &today)?;
            self.day_key = today;
        }
        Ok(())
    }

    fn write_event(&mut self, event: &serde_json::Value) -> std::io::Result<()> {
        self.rotate_if_needed()?;
        let line = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
        writeln!(self.file, "{}", line)?;
        self.file.flush()
    }
}

/// Day-rotating JSONL journal. `disabled()` builds a no-op journal for
/// tests and in-memory runs.
pub struct EventJournal {
    inner: Option<Mutex<Inner>>,
}

impl EventJournal {
    pub fn open(data_dir: &Path) -> std::io::Result<Self> {
        let dir = data_dir.join("journal");
        create_dir_all(&dir)?;
        let day_key = Utc::now().format("%Y-%m-%d").to_string();
        let file = Inner::open_day_file(&dir, &day_key)?;
        Ok(Self {
            inner: Some(Mutex::new(Inner { dir, day_key, file })),
        })
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn write_event(&self, event: serde_json::Value) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut guard = inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = guard.write_event(&event) {
            warn!("Event journal write failed: {}", e);
        }
    }
}
