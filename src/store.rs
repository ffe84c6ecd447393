// src/store.rs
//! Intel store: the persisted `IntelDatabase` file plus the maintenance steps
//! applied on every run (merge, dedup, purge, trim, stats).
//!
//! A run walks the phases strictly in order:
//! Loaded → Scored → Correlated → Merged → Deduplicated → Purged → Trimmed
//! → StatsRefreshed → Persisted.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::error::{ReconError, Result};
use crate::text::is_within;
use crate::types::{CrossReference, IntelDatabase, IntelItem, IntelStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunPhase {
    Loaded,
    Scored,
    Correlated,
    Merged,
    Deduplicated,
    Purged,
    Trimmed,
    StatsRefreshed,
    Persisted,
}

impl RunPhase {
    pub fn next(self) -> Option<RunPhase> {
        use RunPhase::*;
        match self {
            Loaded => Some(Scored),
            Scored => Some(Correlated),
            Correlated => Some(Merged),
            Merged => Some(Deduplicated),
            Deduplicated => Some(Purged),
            Purged => Some(Trimmed),
            Trimmed => Some(StatsRefreshed),
            StatsRefreshed => Some(Persisted),
            Persisted => None,
        }
    }
}

/// Enforces the sequential phase order within one run.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: RunPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: RunPhase::Loaded,
        }
    }

    pub fn current(&self) -> RunPhase {
        self.current
    }

    /// Move to `to`, which must be the immediate successor of the current phase.
    pub fn advance(&mut self, to: RunPhase) -> Result<()> {
        if self.current.next() != Some(to) {
            return Err(ReconError::Phase {
                current: self.current,
                attempted: to,
            });
        }
        tracing::debug!(target: "store", phase = ?to, "phase");
        self.current = to;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreLimits {
    pub max_items: usize,
    pub max_age_hours: u32,
    pub max_cross_refs: usize,
    pub stale_lock_minutes: u64,
}

impl Default for StoreLimits {
    fn default() -> Self {
        StoreLimits::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreLimits {
    fn from(c: &StoreConfig) -> Self {
        Self {
            max_items: c.max_items,
            max_age_hours: c.max_age_hours,
            max_cross_refs: c.max_cross_refs,
            stale_lock_minutes: c.stale_lock_minutes,
        }
    }
}

/// File-backed store. Read once at the start of a run, written once at the end.
#[derive(Debug, Clone)]
pub struct IntelStore {
    path: PathBuf,
    pub limits: StoreLimits,
}

/// Held for the duration of a run; removes the lock file on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(target: "store", path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

fn create_lock_file(path: &Path, now: DateTime<Utc>) -> Result<RunLock> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut f) => {
            let _ = writeln!(f, "{}\n{}", std::process::id(), now.to_rfc3339());
            Ok(RunLock {
                path: path.to_path_buf(),
            })
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(ReconError::Locked {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(ReconError::Lock {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// What an existing lock file says about its holder.
#[derive(Debug, Default)]
struct LockHolder {
    pid: Option<u32>,
    acquired_at: Option<DateTime<Utc>>,
}

impl LockHolder {
    /// PID on the first line, RFC 3339 acquisition time on the second. The
    /// file mtime stands in when the time is missing (killed mid-write).
    fn read(path: &Path) -> Self {
        let raw = fs::read_to_string(path).unwrap_or_default();
        let mut lines = raw.lines();
        let pid = lines.next().and_then(|l| l.trim().parse().ok());
        let acquired_at = lines
            .next()
            .and_then(|l| DateTime::parse_from_rfc3339(l.trim()).ok())
            .map(|t| t.with_timezone(&Utc))
            .or_else(|| {
                fs::metadata(path)
                    .and_then(|m| m.modified())
                    .ok()
                    .map(DateTime::<Utc>::from)
            });
        Self { pid, acquired_at }
    }

    fn is_abandoned(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        if self.pid.and_then(process_alive) == Some(false) {
            return true;
        }
        self.acquired_at
            .is_some_and(|t| now.signed_duration_since(t) > stale_after)
    }
}

/// `None` where liveness cannot be checked without platform APIs.
fn process_alive(pid: u32) -> Option<bool> {
    if pid == std::process::id() {
        return Some(true);
    }
    if cfg!(target_os = "linux") {
        Some(Path::new("/proc").join(pid.to_string()).exists())
    } else {
        None
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

impl IntelStore {
    pub fn new(path: impl Into<PathBuf>, limits: StoreLimits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    pub fn from_config(cfg: &StoreConfig) -> Self {
        Self::new(cfg.path.clone(), StoreLimits::from(cfg))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> PathBuf {
        sibling(&self.path, ".lock")
    }

    /// Missing, unreadable or malformed files all yield an empty database.
    pub fn load(&self) -> IntelDatabase {
        let raw = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(target: "store", path = %self.path.display(), "no store file yet; starting empty");
                return IntelDatabase::default();
            }
            Err(e) => {
                tracing::warn!(target: "store", path = %self.path.display(), error = %e, "store unreadable; starting empty");
                return IntelDatabase::default();
            }
        };
        match serde_json::from_str::<IntelDatabase>(&raw) {
            Ok(db) => {
                tracing::info!(
                    target: "store",
                    items = db.intel.len(),
                    cross_refs = db.cross_refs.len(),
                    run_count = db.run_count,
                    "store loaded"
                );
                db
            }
            Err(e) => {
                tracing::warn!(target: "store", path = %self.path.display(), error = %e, "store malformed; starting empty");
                IntelDatabase::default()
            }
        }
    }

    /// Exclusive run lock next to the store file. A live holder makes a
    /// second run fail fast; a lock left behind by a killed run is taken over.
    pub fn lock(&self, now: DateTime<Utc>) -> Result<RunLock> {
        let path = self.lock_path();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ReconError::Lock {
                path: path.clone(),
                source,
            })?;
        }

        match create_lock_file(&path, now) {
            Err(ReconError::Locked { .. }) => {}
            other => return other,
        }

        let holder = LockHolder::read(&path);
        // capped at a year so the conversion cannot overflow
        let stale_after = Duration::minutes(self.limits.stale_lock_minutes.min(525_600) as i64);
        if !holder.is_abandoned(now, stale_after) {
            return Err(ReconError::Locked { path });
        }

        tracing::warn!(
            target: "store",
            path = %path.display(),
            pid = ?holder.pid,
            acquired_at = ?holder.acquired_at,
            "taking over abandoned run lock"
        );
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => return Err(ReconError::Lock { path, source }),
        }
        // A racing run may win the re-create; it then owns the lock.
        create_lock_file(&path, now)
    }

    /// Whole-file write through a temp sibling and rename.
    pub fn save(&self, db: &IntelDatabase) -> Result<()> {
        let json = serde_json::to_string_pretty(db)?;
        let persist_err = |source| ReconError::Persist {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(persist_err)?;
        }
        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, json).map_err(persist_err)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(persist_err(e));
        }

        tracing::info!(target: "store", path = %self.path.display(), items = db.intel.len(), "store saved");
        Ok(())
    }
}

/// New batch ahead of stored items, so the first copy of a fingerprint is the newest.
pub fn merge(batch: Vec<IntelItem>, existing: Vec<IntelItem>) -> Vec<IntelItem> {
    let mut out = batch;
    out.extend(existing);
    out
}

/// Keep the first item per fingerprint. Consumer-owned usage fields and
/// already generated angles of dropped copies are folded into the kept one.
pub fn dedup(items: Vec<IntelItem>) -> Vec<IntelItem> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<IntelItem> = Vec::with_capacity(items.len());

    for item in items {
        match index.get(item.fingerprint()) {
            Some(&i) => {
                let kept = &mut out[i];
                kept.used |= item.used;
                kept.used_count = kept.used_count.max(item.used_count);
                kept.last_used = kept.last_used.max(item.last_used);
                if !item.angles.is_empty() {
                    kept.angles = item.angles;
                }
            }
            None => {
                index.insert(item.fingerprint().to_string(), out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Drop items older than the age window. Returns the number removed.
pub fn purge(items: &mut Vec<IntelItem>, now: DateTime<Utc>, max_age_hours: u32) -> usize {
    let before = items.len();
    items.retain(|i| is_within(i.timestamp(), max_age_hours, now));
    before - items.len()
}

/// Only when over `max`: keep the top `max` by juiciness desc, then timestamp desc.
pub fn trim(items: &mut Vec<IntelItem>, max: usize) -> usize {
    if items.len() <= max {
        return 0;
    }
    let before = items.len();
    items.sort_by(|a, b| {
        b.juiciness
            .cmp(&a.juiciness)
            .then_with(|| b.timestamp().cmp(&a.timestamp()))
    });
    items.truncate(max);
    before - max
}

/// Newest first, capped.
pub fn merge_cross_refs(
    fresh: Vec<CrossReference>,
    existing: Vec<CrossReference>,
    cap: usize,
) -> Vec<CrossReference> {
    let mut out = fresh;
    out.extend(existing);
    out.truncate(cap);
    out
}

/// Rebuild every aggregate from the current item set.
pub fn compute_stats(
    intel: &[IntelItem],
    cross_refs: &[CrossReference],
    last_run_findings: usize,
    last_run_new_items: usize,
    previous: &IntelStats,
) -> IntelStats {
    let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_entity: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_signal: BTreeMap<String, usize> = BTreeMap::new();

    for i in intel {
        *by_category.entry(i.finding.category.clone()).or_default() += 1;
        for e in &i.finding.entities {
            *by_entity.entry(e.clone()).or_default() += 1;
        }
        for s in &i.finding.signals {
            *by_signal.entry(s.clone()).or_default() += 1;
        }
    }

    let avg = if intel.is_empty() {
        0.0
    } else {
        let sum: u64 = intel.iter().map(|i| u64::from(i.juiciness)).sum();
        ((sum as f64 / intel.len() as f64) * 100.0).round() / 100.0
    };

    IntelStats {
        total_items: intel.len(),
        unused_items: intel.iter().filter(|i| !i.used).count(),
        cross_ref_count: cross_refs.len(),
        avg_juiciness: avg,
        by_category,
        by_entity,
        by_signal,
        last_run_findings,
        last_run_new_items,
        lifetime_findings: previous
            .lifetime_findings
            .saturating_add(last_run_findings as u64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Finding, Sentiment};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap()
    }

    fn item(fp: &str, juiciness: u8, hours_ago: i64) -> IntelItem {
        IntelItem {
            finding: Finding {
                category: "energy".into(),
                subcategory: "crisis".into(),
                signals: vec!["outage".into()],
                headline: format!("headline {fp}"),
                summary: String::new(),
                source: "t".into(),
                source_url: String::new(),
                entities: vec!["LUMA Energy".into()],
                money_mentioned: vec![],
                timestamp: now() - Duration::hours(hours_ago),
                fingerprint: fp.into(),
            },
            juiciness,
            tags: vec![],
            angles: vec![],
            sentiment: Sentiment::Neutral,
            used: false,
            used_count: 0,
            last_used: None,
        }
    }

    #[test]
    fn phases_must_be_sequential() {
        let mut t = PhaseTracker::new();
        t.advance(RunPhase::Scored).unwrap();
        let err = t.advance(RunPhase::Merged).unwrap_err();
        assert!(matches!(
            err,
            ReconError::Phase {
                current: RunPhase::Scored,
                attempted: RunPhase::Merged
            }
        ));
        for p in [
            RunPhase::Correlated,
            RunPhase::Merged,
            RunPhase::Deduplicated,
            RunPhase::Purged,
            RunPhase::Trimmed,
            RunPhase::StatsRefreshed,
            RunPhase::Persisted,
        ] {
            t.advance(p).unwrap();
        }
        assert!(t.advance(RunPhase::Loaded).is_err());
    }

    #[test]
    fn dedup_keeps_newest_copy_and_carries_usage() {
        let mut fresh = item("a", 8, 1);
        fresh.finding.headline = "fresh".into();
        let mut stale = item("a", 5, 10);
        stale.used = true;
        stale.used_count = 2;
        stale.last_used = Some(now() - Duration::hours(3));
        stale.angles = vec!["x".into(), "y".into()];

        let out = dedup(merge(vec![fresh, item("b", 6, 2)], vec![stale]));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].finding.headline, "fresh");
        assert_eq!(out[0].juiciness, 8);
        assert!(out[0].used);
        assert_eq!(out[0].used_count, 2);
        assert_eq!(out[0].angles, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(out[1].fingerprint(), "b");
    }

    #[test]
    fn purge_enforces_age_window() {
        let mut v = vec![
            item("a", 5, 1),
            item("b", 5, 72),
            item("c", 5, 73),
            item("d", 5, -2),
            item("e", 10, -24 * 365),
        ];
        assert_eq!(purge(&mut v, now(), 72), 2);
        let fps: Vec<_> = v.iter().map(|i| i.fingerprint()).collect();
        assert_eq!(fps, vec!["a", "b", "d"]);
    }

    #[test]
    fn trim_only_over_cap_and_keeps_top_by_score_then_recency() {
        let mut v = vec![item("a", 5, 1), item("b", 9, 5), item("c", 9, 2), item("d", 7, 1)];
        assert_eq!(trim(&mut v, 4), 0);
        assert_eq!(v[0].fingerprint(), "a");

        assert_eq!(trim(&mut v, 3), 1);
        let fps: Vec<_> = v.iter().map(|i| i.fingerprint()).collect();
        assert_eq!(fps, vec!["c", "b", "d"]);
    }

    #[test]
    fn cross_refs_prepend_and_cap() {
        let mk = |h: &str| CrossReference {
            kind: "recurring_issue".into(),
            entities: vec!["X".into()],
            new_item: crate::types::CrossRefNewItem {
                headline: h.into(),
                date: now(),
                category: "energy".into(),
            },
            old_item: crate::types::CrossRefOldItem {
                headline: "o".into(),
                date: now(),
            },
            juiciness: 7,
            angle: "a".into(),
        };
        let out = merge_cross_refs(vec![mk("n1")], vec![mk("o1"), mk("o2")], 2);
        let heads: Vec<_> = out.iter().map(|c| c.new_item.headline.as_str()).collect();
        assert_eq!(heads, vec!["n1", "o1"]);
    }

    #[test]
    fn stats_rebuilt_and_lifetime_monotonic() {
        let mut used = item("b", 6, 1);
        used.used = true;
        let v = vec![item("a", 9, 1), used];
        let prev = IntelStats {
            lifetime_findings: 10,
            by_entity: BTreeMap::from([("stale".to_string(), 99)]),
            ..Default::default()
        };
        let s = compute_stats(&v, &[], 4, 2, &prev);
        assert_eq!(s.total_items, 2);
        assert_eq!(s.unused_items, 1);
        assert_eq!(s.avg_juiciness, 7.5);
        assert_eq!(s.by_category.get("energy"), Some(&2));
        assert_eq!(s.by_entity.get("LUMA Energy"), Some(&2));
        assert!(s.by_entity.get("stale").is_none());
        assert_eq!(s.lifetime_findings, 14);
    }

    #[test]
    fn load_tolerates_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("intel.json"), StoreLimits::default());
        assert_eq!(store.load(), IntelDatabase::default());

        fs::write(store.path(), "{ not json").unwrap();
        assert_eq!(store.load(), IntelDatabase::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("nested/intel.json"), StoreLimits::default());
        let mut db = IntelDatabase::default();
        db.intel.push(item("a", 7, 1));
        db.run_count = 3;
        store.save(&db).unwrap();
        assert_eq!(store.load(), db);
        assert!(!sibling(store.path(), ".tmp").exists());
    }

    #[test]
    fn second_lock_fails_until_first_released() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("intel.json"), StoreLimits::default());
        let guard = store.lock(now()).unwrap();
        assert!(matches!(store.lock(now()), Err(ReconError::Locked { .. })));
        drop(guard);
        assert!(!store.lock_path().exists());
        let _again = store.lock(now()).unwrap();
    }

    #[test]
    fn lock_left_by_killed_run_is_taken_over_once_stale() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("intel.json"), StoreLimits::default());
        // no destructor: the lock file stays, as after SIGKILL
        std::mem::forget(store.lock(now()).unwrap());

        let soon = now() + Duration::minutes(10);
        assert!(matches!(store.lock(soon), Err(ReconError::Locked { .. })));

        let later = now() + Duration::minutes(31);
        let guard = store.lock(later).unwrap();
        let raw = fs::read_to_string(store.lock_path()).unwrap();
        assert!(raw.contains(&later.to_rfc3339()));
        drop(guard);
        assert!(!store.lock_path().exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn lock_of_vanished_process_is_taken_over_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("intel.json"), StoreLimits::default());
        // above any kernel pid_max, so no such process
        fs::write(store.lock_path(), format!("999999999\n{}\n", now().to_rfc3339())).unwrap();
        assert!(store.lock(now()).is_ok());
    }

    #[test]
    fn lock_without_timestamp_falls_back_to_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = IntelStore::new(dir.path().join("intel.json"), StoreLimits::default());
        fs::write(store.lock_path(), format!("{}\n", std::process::id())).unwrap();
        let holder = LockHolder::read(&store.lock_path());
        assert_eq!(holder.pid, Some(std::process::id()));
        assert!(holder.acquired_at.is_some());
        assert!(!holder.is_abandoned(Utc::now(), Duration::minutes(30)));
        assert!(holder.is_abandoned(Utc::now() + Duration::hours(1), Duration::minutes(30)));
    }

    #[test]
    fn save_into_unwritable_location_is_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        // parent is a regular file, so the directory cannot be created
        let store = IntelStore::new(blocker.join("intel.json"), StoreLimits::default());
        assert!(matches!(
            store.save(&IntelDatabase::default()),
            Err(ReconError::Persist { .. })
        ));
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intel.json");
        // non-empty directory in the store's place: rename onto it fails
        fs::create_dir_all(path.join("occupied")).unwrap();
        let store = IntelStore::new(&path, StoreLimits::default());
        assert!(matches!(
            store.save(&IntelDatabase::default()),
            Err(ReconError::Persist { .. })
        ));
        assert!(!sibling(&path, ".tmp").exists());
    }
}
