//! Append-only history of plugin counts.
//!
//! The log lives at `<data_dir>/history.jsonl`, one [`CountSample`] per line,
//! so it can be inspected and repaired with ordinary text tools. Writers take
//! an exclusive `fd-lock` on the file and append each record with a single
//! `write_all` to a file opened in append mode, so overlapping runs never
//! interleave records. A process killed mid-write leaves at most one
//! unterminated trailing line; readers skip it and the next append starts on
//! a fresh line.
//!
//! The store is an explicit object: open it at the start of a run, pass it to
//! the pipeline, and [`close`](HistoryStore::close) it at the end.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use fd_lock::RwLock;
use tracing::{info, warn};

use crate::error::PlugcountError;
use crate::types::CountSample;

/// File name of the history log inside the data directory.
pub const HISTORY_FILE: &str = "history.jsonl";

pub struct HistoryStore {
    path: PathBuf,
    file: RwLock<File>,
    samples: Vec<CountSample>,
    /// Bytes of the file already folded into `samples`.
    read_offset: u64,
    /// The consumed bytes end without a newline (torn final record).
    torn_tail: bool,
}

fn store_err(context: &str, path: &Path) -> impl Fn(std::io::Error) -> PlugcountError {
    let message = format!("{context} {}", path.display());
    move |e| PlugcountError::Store(format!("{message}: {e}"))
}

impl HistoryStore {
    /// Opens (creating if needed) the history log under `data_dir` and loads
    /// every readable sample.
    ///
    /// # Errors
    ///
    /// Returns [`PlugcountError::Store`] if the directory or file cannot be
    /// created, locked or read. Malformed lines are skipped, not errors.
    pub fn open(data_dir: &Path) -> Result<Self, PlugcountError> {
        fs::create_dir_all(data_dir).map_err(store_err("cannot create", data_dir))?;
        let path = data_dir.join(HISTORY_FILE);

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(store_err("cannot open", &path))?;

        let mut store = Self {
            path,
            file: RwLock::new(file),
            samples: Vec::new(),
            read_offset: 0,
            torn_tail: false,
        };
        store.refresh()?;
        Ok(store)
    }

    /// Picks up records appended by other processes since the last read.
    pub fn refresh(&mut self) -> Result<(), PlugcountError> {
        let guard = self
            .file
            .read()
            .map_err(store_err("cannot lock", &self.path))?;
        let fresh = read_new_records(
            &guard,
            &self.path,
            &mut self.read_offset,
            &mut self.torn_tail,
        )?;
        self.samples.extend(fresh);
        Ok(())
    }

    /// Durably appends `sample` and returns the record as stored.
    ///
    /// If the sample is older than the latest stored sample of the same
    /// repository (clock skew between runs), its timestamp is raised to that
    /// latest timestamp so per-repository order stays non-decreasing.
    ///
    /// # Errors
    ///
    /// Returns [`PlugcountError::Store`] if the record cannot be written and
    /// synced. The in-memory view is only updated after a successful write.
    pub fn append(&mut self, sample: CountSample) -> Result<CountSample, PlugcountError> {
        let mut guard = self
            .file
            .write()
            .map_err(store_err("cannot lock", &self.path))?;

        let fresh = read_new_records(
            &guard,
            &self.path,
            &mut self.read_offset,
            &mut self.torn_tail,
        )?;
        self.samples.extend(fresh);

        let mut sample = sample;
        if let Some(last) = self
            .samples
            .iter()
            .rev()
            .find(|s| s.repository_name == sample.repository_name)
        {
            if sample.timestamp < last.timestamp {
                warn!(
                    repository = %sample.repository_name,
                    sample = %sample.timestamp,
                    latest = %last.timestamp,
                    "sample predates stored history, clamping timestamp"
                );
                sample.timestamp = last.timestamp;
            }
        }

        let mut line = String::new();
        if self.torn_tail {
            line.push('\n');
        }
        line.push_str(
            &serde_json::to_string(&sample)
                .map_err(|e| PlugcountError::Store(format!("cannot encode sample: {e}")))?,
        );
        line.push('\n');

        guard
            .write_all(line.as_bytes())
            .map_err(store_err("cannot write", &self.path))?;
        guard
            .sync_data()
            .map_err(store_err("cannot sync", &self.path))?;

        self.read_offset += line.len() as u64;
        self.torn_tail = false;
        self.samples.push(sample.clone());
        Ok(sample)
    }

    /// Samples of `repository` with `timestamp >= since`, in storage order.
    pub fn query(&self, repository: &str, since: DateTime<Utc>) -> Vec<CountSample> {
        self.samples
            .iter()
            .filter(|s| s.repository_name == repository && s.timestamp >= since)
            .cloned()
            .collect()
    }

    /// The sample of `repository` with the greatest timestamp not after
    /// `at`. Among equal timestamps the one stored last wins.
    pub fn latest_before(&self, repository: &str, at: DateTime<Utc>) -> Option<CountSample> {
        self.samples
            .iter()
            .filter(|s| s.repository_name == repository && s.timestamp <= at)
            .max_by_key(|s| s.timestamp)
            .cloned()
    }

    /// Every sample of `repository`, in storage order.
    pub fn samples(&self, repository: &str) -> Vec<CountSample> {
        self.samples
            .iter()
            .filter(|s| s.repository_name == repository)
            .cloned()
            .collect()
    }

    /// Every sample across repositories, in storage order.
    pub fn all(&self) -> &[CountSample] {
        &self.samples
    }

    /// Repository names with at least one sample, in first-seen order.
    pub fn repositories(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for sample in &self.samples {
            if !names.contains(&sample.repository_name) {
                names.push(sample.repository_name.clone());
            }
        }
        names
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Imports the legacy `plugin_history.json` layout
    /// (`{"<repo>": {"YYYY-MM-DD": count}}`), one sample per day at midnight
    /// UTC. Repositories that already have history here are left alone.
    /// Returns the number of samples imported.
    pub fn import_legacy(&mut self, legacy_path: &Path) -> Result<usize, PlugcountError> {
        let content = fs::read_to_string(legacy_path)?;
        let legacy: BTreeMap<String, BTreeMap<String, u64>> = serde_json::from_str(&content)?;

        let mut imported = 0;
        for (repository, days) in legacy {
            if self.samples.iter().any(|s| s.repository_name == repository) {
                info!(%repository, "history already present, skipping legacy import");
                continue;
            }

            for (day, count) in days {
                let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                    PlugcountError::Other(format!("invalid date '{day}' for {repository}: {e}"))
                })?;
                let timestamp = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| PlugcountError::Other(format!("invalid date '{day}'")))?
                    .and_utc();
                self.append(CountSample::new(repository.clone(), timestamp, count))?;
                imported += 1;
            }
        }

        Ok(imported)
    }

    /// Flushes the log to disk and releases the file.
    pub fn close(self) -> Result<(), PlugcountError> {
        let path = self.path;
        self.file
            .into_inner()
            .sync_all()
            .map_err(store_err("cannot sync", &path))
    }
}

/// Reads and parses everything after `offset`, advancing it past every byte
/// read. Malformed or torn lines are logged and skipped.
fn read_new_records(
    file: &File,
    path: &Path,
    offset: &mut u64,
    torn_tail: &mut bool,
) -> Result<Vec<CountSample>, PlugcountError> {
    let mut reader = file;
    reader
        .seek(SeekFrom::Start(*offset))
        .map_err(store_err("cannot seek", path))?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(store_err("cannot read", path))?;

    if buf.is_empty() {
        return Ok(Vec::new());
    }

    let ends_with_newline = buf.ends_with(b"\n");
    let text = String::from_utf8_lossy(&buf);
    let mut lines: Vec<&str> = text.split('\n').collect();
    // `split` yields a trailing fragment: empty when the buffer ends with a
    // newline, the torn record otherwise.
    let tail = lines.pop().unwrap_or_default();
    if !ends_with_newline {
        warn!(
            path = %path.display(),
            bytes = tail.len(),
            "ignoring unterminated record at end of history"
        );
    }

    let mut samples = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CountSample>(line) {
            Ok(sample) => samples.push(sample),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping malformed history record"),
        }
    }

    *offset += buf.len() as u64;
    *torn_tail = !ends_with_newline;
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn sample(repo: &str, hours: i64, count: u64) -> CountSample {
        CountSample::new(repo, at(hours), count)
    }

    #[test]
    fn open_creates_empty_log() {
        let tmp = TempDir::new().unwrap();
        let data = tmp.path().join("data");
        let store = HistoryStore::open(&data).unwrap();
        assert!(store.is_empty());
        assert!(data.join(HISTORY_FILE).is_file());
    }

    #[test]
    fn appends_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        store.append(sample("community", 0, 100)).unwrap();
        store.append(sample("official", 0, 50)).unwrap();
        store.append(sample("community", 1, 100)).unwrap();
        store.close().unwrap();

        let store = HistoryStore::open(tmp.path()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.samples("community").len(), 2);
        assert_eq!(store.repositories(), vec!["community", "official"]);
    }

    #[test]
    fn query_returns_suffix_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        for (h, c) in [(0, 10), (5, 11), (10, 12), (15, 13)] {
            store.append(sample("community", h, c)).unwrap();
            store.append(sample("official", h, c * 2)).unwrap();
        }

        let counts: Vec<u64> = store
            .query("community", at(5))
            .iter()
            .map(|s| s.count)
            .collect();
        assert_eq!(counts, vec![11, 12, 13]);
        assert!(store.query("community", at(16)).is_empty());
        assert!(store.query("unknown", at(0)).is_empty());
    }

    #[test]
    fn latest_before_picks_greatest_not_after() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        store.append(sample("community", 0, 10)).unwrap();
        store.append(sample("community", 5, 11)).unwrap();
        store.append(sample("community", 10, 12)).unwrap();

        assert_eq!(store.latest_before("community", at(-1)), None);
        assert_eq!(store.latest_before("community", at(5)).unwrap().count, 11);
        assert_eq!(store.latest_before("community", at(7)).unwrap().count, 11);
        assert_eq!(store.latest_before("community", at(99)).unwrap().count, 12);
        assert_eq!(store.latest_before("official", at(99)), None);
    }

    #[test]
    fn latest_before_tie_prefers_last_stored() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        store.append(sample("community", 3, 10)).unwrap();
        store.append(sample("community", 3, 11)).unwrap();
        store.append(sample("community", 3, 12)).unwrap();

        assert_eq!(store.latest_before("community", at(3)).unwrap().count, 12);
    }

    #[test]
    fn duplicate_counts_are_kept() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        store.append(sample("community", 0, 10)).unwrap();
        store.append(sample("community", 1, 10)).unwrap();
        assert_eq!(store.samples("community").len(), 2);
    }

    #[test]
    fn skewed_sample_is_clamped() {
        let tmp = TempDir::new().unwrap();
        let mut store = HistoryStore::open(tmp.path()).unwrap();
        store.append(sample("community", 10, 10)).unwrap();
        let stored = store.append(sample("community", 4, 11)).unwrap();
        assert_eq!(stored.timestamp, at(10));
        assert_eq!(stored.count, 11);

        // Other repositories are unaffected.
        let stored = store.append(sample("official", 4, 1)).unwrap();
        assert_eq!(stored.timestamp, at(4));
    }

    #[test]
    fn torn_and_malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(HISTORY_FILE);
        let good = serde_json::to_string(&sample("community", 0, 10)).unwrap();
        fs::write(
            &path,
            format!("{good}\nnot json at all\n{{\"repository_name\":\"community\",\"timest"),
        )
        .unwrap();

        let mut store = HistoryStore::open(tmp.path()).unwrap();
        assert_eq!(store.len(), 1);

        store.append(sample("community", 1, 11)).unwrap();
        store.close().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("\"count\":11}\n"));

        let store = HistoryStore::open(tmp.path()).unwrap();
        let counts: Vec<u64> = store.samples("community").iter().map(|s| s.count).collect();
        assert_eq!(counts, vec![10, 11]);
    }

    #[test]
    fn sees_appends_from_another_handle() {
        let tmp = TempDir::new().unwrap();
        let mut first = HistoryStore::open(tmp.path()).unwrap();
        let mut second = HistoryStore::open(tmp.path()).unwrap();

        first.append(sample("community", 0, 10)).unwrap();
        second.append(sample("community", 1, 11)).unwrap();
        assert_eq!(second.len(), 2);

        first.refresh().unwrap();
        assert_eq!(first.len(), 2);

        let content = fs::read_to_string(tmp.path().join(HISTORY_FILE)).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn concurrent_writers_never_tear_records() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().to_path_buf();

        let writers: Vec<_> = (0..8)
            .map(|writer| {
                let data_dir = data_dir.clone();
                std::thread::spawn(move || {
                    let mut store = HistoryStore::open(&data_dir).unwrap();
                    let repo = if writer % 2 == 0 { "community" } else { "official" };
                    for i in 0..50 {
                        store.append(sample(repo, i, writer * 100 + i as u64)).unwrap();
                    }
                    store.close().unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let content = fs::read_to_string(tmp.path().join(HISTORY_FILE)).unwrap();
        assert_eq!(content.lines().count(), 400);
        assert!(content.ends_with('\n'));

        let store = HistoryStore::open(tmp.path()).unwrap();
        assert_eq!(store.len(), 400);
        for repo in ["community", "official"] {
            let samples = store.samples(repo);
            assert_eq!(samples.len(), 200);
            assert!(samples.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        }
    }

    #[test]
    fn import_legacy_history() {
        let tmp = TempDir::new().unwrap();
        let legacy = tmp.path().join("plugin_history.json");
        fs::write(
            &legacy,
            r#"{"community": {"2025-03-02": 120, "2025-03-01": 115}, "official": {"2025-03-02": 80}}"#,
        )
        .unwrap();

        let mut store = HistoryStore::open(&tmp.path().join("data")).unwrap();
        store.append(sample("official", 0, 90)).unwrap();

        let imported = store.import_legacy(&legacy).unwrap();
        assert_eq!(imported, 2);

        let community = store.samples("community");
        assert_eq!(community[0].count, 115);
        assert_eq!(
            community[0].timestamp,
            Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(community[1].count, 120);
        assert_eq!(store.samples("official").len(), 1);
    }
}
