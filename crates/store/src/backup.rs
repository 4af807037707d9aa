//! Last-known-good backup log.
//!
//! Every live snapshot is appended here as well as cached, so when the
//! provider goes dark the most recent real observation can still be
//! served (flagged stale). Bounded per zone, persisted as JSONL and
//! replayed at startup so a restart does not lose the fallback tier.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use common::config::BackupConfig;
use common::{Clock, Result, RiskLevel, SourceTag, WeatherSnapshot};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const BACKUP_FILE: &str = "backups.jsonl";

/// One archived observation. Only live data is archived, so the
/// source tag is always `live`; it is recorded anyway so JSONL
/// consumers need no out-of-band knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    pub zone_id: String,
    pub snapshot: WeatherSnapshot,
    pub risk: RiskLevel,
    pub source: SourceTag,
    pub saved_at: DateTime<Utc>,
}

impl BackupRecord {
    /// Age of the record in whole hours at `now`.
    pub fn age_hours(&self, now: DateTime<Utc>) -> i64 {
        (now - self.saved_at).num_hours()
    }
}

/// Per-zone ring of recent observations, newest last.
pub struct BackupLog {
    per_zone: DashMap<String, VecDeque<BackupRecord>>,
    config: BackupConfig,
    clock: Arc<dyn Clock>,
    data_dir: Option<PathBuf>,
    // Serializes appends and rewrites of the JSONL file.
    file_lock: Mutex<()>,
}

impl BackupLog {
    /// Open the log, replaying any persisted records still inside the
    /// purge window. `data_dir: None` keeps everything in memory.
    pub fn open(
        config: BackupConfig,
        clock: Arc<dyn Clock>,
        data_dir: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = &data_dir {
            fs::create_dir_all(dir)?;
        }

        let log = Self {
            per_zone: DashMap::new(),
            config,
            clock,
            data_dir,
            file_lock: Mutex::new(()),
        };
        log.replay()?;
        Ok(log)
    }

    fn file_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|d| d.join(BACKUP_FILE))
    }

    fn replay(&self) -> Result<()> {
        let Some(path) = self.file_path() else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let cutoff = self.clock.now() - Duration::days(i64::from(self.config.purge_days));
        let reader = BufReader::new(fs::File::open(&path)?);
        let mut kept = 0usize;
        let mut skipped = 0usize;

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BackupRecord>(&line) {
                Ok(record) if record.saved_at >= cutoff => {
                    self.insert(record);
                    kept += 1;
                }
                Ok(_) => skipped += 1,
                Err(e) => {
                    warn!("Skipping corrupt backup line: {e}");
                    skipped += 1;
                }
            }
        }

        info!("Backup log replay: {kept} records kept, {skipped} skipped");
        Ok(())
    }

    fn insert(&self, record: BackupRecord) {
        let mut ring = self.per_zone.entry(record.zone_id.clone()).or_default();
        ring.push_back(record);
        while ring.len() > self.config.max_per_zone {
            ring.pop_front();
        }
    }

    /// Archive one observation. The in-memory ring is always updated;
    /// a persistence failure only warns, the next append retries.
    pub fn append(&self, zone_id: &str, snapshot: &WeatherSnapshot, risk: RiskLevel) {
        let record = BackupRecord {
            zone_id: zone_id.to_string(),
            snapshot: snapshot.clone(),
            risk,
            source: SourceTag::Live,
            saved_at: self.clock.now(),
        };

        if let Some(path) = self.file_path() {
            if let Err(e) = self.append_line(&path, &record) {
                warn!("Backup append for {zone_id} not persisted: {e}");
            }
        }
        self.insert(record);
    }

    fn append_line(&self, path: &Path, record: &BackupRecord) -> std::io::Result<()> {
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(file, "{line}")
    }

    /// Most recent record for the zone, only if within the retention
    /// window. Older records exist but are too stale to serve.
    pub fn latest(&self, zone_id: &str) -> Option<BackupRecord> {
        let cutoff = self.clock.now() - Duration::hours(i64::from(self.config.retention_hours));
        self.per_zone
            .get(zone_id)
            .and_then(|ring| ring.back().cloned())
            .filter(|record| record.saved_at >= cutoff)
    }

    /// Newest record regardless of age. Feeds the status surface and
    /// the refresh spacing check, never the serving path.
    pub fn latest_any_age(&self, zone_id: &str) -> Option<BackupRecord> {
        self.per_zone
            .get(zone_id)
            .and_then(|ring| ring.back().cloned())
    }

    /// Drop records older than the purge window and compact the file.
    /// Returns how many records were dropped.
    pub fn purge_stale(&self) -> usize {
        let cutoff = self.clock.now() - Duration::days(i64::from(self.config.purge_days));
        let mut dropped = 0usize;

        for mut entry in self.per_zone.iter_mut() {
            let before = entry.len();
            entry.retain(|record| record.saved_at >= cutoff);
            dropped += before - entry.len();
        }
        self.per_zone.retain(|_, ring| !ring.is_empty());

        if dropped > 0 {
            debug!("Backup purge dropped {dropped} stale records");
            if let Err(e) = self.rewrite() {
                warn!("Backup file compaction failed: {e}");
            }
        }
        dropped
    }

    // Rewrite the JSONL file from the in-memory state.
    fn rewrite(&self) -> std::io::Result<()> {
        let Some(path) = self.file_path() else {
            return Ok(());
        };
        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut out = Vec::new();
        for entry in self.per_zone.iter() {
            for record in entry.iter() {
                let line = serde_json::to_string(record)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                out.push(line);
            }
        }
        fs::write(&path, out.join("\n") + "\n")
    }

    /// Total records held across all zones.
    pub fn len(&self) -> usize {
        self.per_zone.iter().map(|e| e.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::ManualClock;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            temperature_c: 28.0,
            humidity_pct: 75,
            wind_speed_kmh: 12.0,
            wind_direction_deg: None,
            pressure_hpa: Some(1013.0),
            precipitation_mm: 0.0,
            precipitation_probability: None,
            visibility_km: None,
            uv_index: None,
            description: "ciel dégagé".into(),
            icon: "01d".into(),
            observed_at: Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        }
    }

    fn log_at_noon() -> (BackupLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        ));
        let log = BackupLog::open(BackupConfig::default(), clock.clone(), None).unwrap();
        (log, clock)
    }

    #[test]
    fn test_latest_respects_retention_window() {
        let (log, clock) = log_at_noon();
        log.append("bouillante", &snapshot(), RiskLevel::Low);

        clock.advance(Duration::hours(23));
        assert!(log.latest("bouillante").is_some());

        clock.advance(Duration::hours(2));
        assert!(
            log.latest("bouillante").is_none(),
            "25h-old record served within a 24h retention window"
        );
        // Still visible to the status surface.
        assert!(log.latest_any_age("bouillante").is_some());
    }

    #[test]
    fn test_ring_bounded_per_zone() {
        let (log, clock) = log_at_noon();
        for _ in 0..15 {
            log.append("goyave", &snapshot(), RiskLevel::Low);
            clock.advance(Duration::minutes(1));
        }
        assert_eq!(log.len(), BackupConfig::default().max_per_zone);
        // Newest record survives.
        let newest = log.latest("goyave").unwrap();
        assert_eq!(
            newest.saved_at,
            Utc.with_ymd_and_hms(2025, 6, 15, 12, 14, 0).unwrap()
        );
    }

    #[test]
    fn test_purge_drops_old_records() {
        let (log, clock) = log_at_noon();
        log.append("baillif", &snapshot(), RiskLevel::Low);
        clock.advance(Duration::days(8));
        log.append("baillif", &snapshot(), RiskLevel::Low);

        assert_eq!(log.purge_stale(), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_replay_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap(),
        ));

        {
            let log = BackupLog::open(
                BackupConfig::default(),
                clock.clone(),
                Some(dir.path().to_path_buf()),
            )
            .unwrap();
            log.append("vieux-fort", &snapshot(), RiskLevel::Moderate);
            log.append("vieux-fort", &snapshot(), RiskLevel::Low);
        }

        let reopened = BackupLog::open(
            BackupConfig::default(),
            clock,
            Some(dir.path().to_path_buf()),
        )
        .unwrap();
        assert_eq!(reopened.len(), 2);
        let latest = reopened.latest("vieux-fort").unwrap();
        assert_eq!(latest.risk, RiskLevel::Low);
    }
}
