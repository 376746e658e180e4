//! Filesystem-backed response log: one pretty JSON file per backend call.
//!
//! Filenames look like
//! `gemini-response-gemini-1.5-flash-2024-05-01-13-45-09-Ab3dE9xYz0.json`
//! (`<backend>-response-<model>-<date>-<time>-<request id>`), which lets the
//! log be listed by UTC date range and swept by age without opening files.
//!
//! Inside a tokio runtime, `record` hands the write to the blocking pool and
//! returns immediately; async callers reach the other operations through
//! [`FileResponseLog::run_blocking`].

use super::{LogEntry, ResponseSink};
use crate::error::LogError;
use crate::types::BackendKind;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Writes, lists, reads and sweeps response log files in one directory.
#[derive(Debug, Clone)]
pub struct FileResponseLog {
    dir: PathBuf,
}

/// Listing entry for one log file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFileInfo {
    pub filename: String,
    pub backend: String,
    pub model: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub size_bytes: u64,
}

/// Fields recovered from a log filename.
#[derive(Debug, Clone, PartialEq)]
struct ParsedName {
    backend: String,
    model: String,
    date: NaiveDate,
    time: NaiveTime,
}

impl FileResponseLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filename an entry is stored under.
    pub fn filename_for(entry: &LogEntry) -> String {
        format!(
            "{}-response-{}-{}-{}.json",
            entry.backend,
            sanitize_model(&entry.model),
            entry.timestamp.format("%Y-%m-%d-%H-%M-%S"),
            entry.request_id
        )
    }

    /// Persist one entry, creating the directory on first use.
    pub fn write(&self, entry: &LogEntry) -> Result<PathBuf, LogError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(Self::filename_for(entry));
        let json = serde_json::to_vec_pretty(entry)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    /// List log files whose UTC date falls within `[start, end]`, newest first.
    ///
    /// A missing directory lists as empty.
    pub fn list(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<LogFileInfo>, LogError> {
        let mut files = Vec::new();
        for (filename, parsed, path) in self.log_files()? {
            if start.is_some_and(|s| parsed.date < s) || end.is_some_and(|e| parsed.date > e) {
                continue;
            }
            let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            files.push(LogFileInfo {
                filename,
                backend: parsed.backend,
                model: parsed.model,
                date: parsed.date,
                time: parsed.time,
                size_bytes,
            });
        }
        files.sort_by(|a, b| {
            (b.date, b.time, &b.filename).cmp(&(a.date, a.time, &a.filename))
        });
        Ok(files)
    }

    /// Read one log file by name. Names that are not log filenames are rejected.
    pub fn read(&self, filename: &str) -> Result<String, LogError> {
        if filename.contains(['/', '\\']) || filename.contains("..") || parse_filename(filename).is_none()
        {
            return Err(LogError::InvalidFilename(filename.to_string()));
        }
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(LogError::NotFound(filename.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    /// Delete log files older than `older_than_days` days (UTC), or every log
    /// file when `older_than_days` is 0. Returns the number of files removed.
    pub fn purge(&self, older_than_days: u32) -> Result<usize, LogError> {
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(i64::from(older_than_days));
        let mut removed = 0;
        for (filename, parsed, path) in self.log_files()? {
            if older_than_days == 0 || parsed.date < cutoff {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed response log {filename}");
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Run a filesystem operation on the blocking thread pool.
    pub async fn run_blocking<T, F>(&self, op: F) -> Result<T, LogError>
    where
        T: Send + 'static,
        F: FnOnce(&FileResponseLog) -> Result<T, LogError> + Send + 'static,
    {
        let log = self.clone();
        tokio::task::spawn_blocking(move || op(&log))
            .await
            .map_err(|e| LogError::Task(e.to_string()))?
    }

    fn write_logged(&self, entry: &LogEntry) {
        match self.write(entry) {
            Ok(path) => tracing::debug!("Response log written to {}", path.display()),
            Err(e) => tracing::warn!(
                "Failed to write response log for request {}: {e}",
                entry.request_id
            ),
        }
    }

    fn log_files(&self) -> Result<Vec<(String, ParsedName, PathBuf)>, LogError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(filename) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if let Some(parsed) = parse_filename(&filename) {
                files.push((filename, parsed, entry.path()));
            }
        }
        Ok(files)
    }
}

impl ResponseSink for FileResponseLog {
    fn record(&self, entry: LogEntry) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let log = self.clone();
                handle.spawn_blocking(move || log.write_logged(&entry));
            }
            Err(_) => self.write_logged(&entry),
        }
    }
}

/// Keep model names filename-safe.
fn sanitize_model(model: &str) -> String {
    let cleaned: String = model
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Parse `<backend>-response-<model>-<YYYY>-<MM>-<DD>-<hh>-<mm>-<ss>-<id>.json`.
///
/// The model may itself contain hyphens, so the fixed fields are taken from the right.
fn parse_filename(filename: &str) -> Option<ParsedName> {
    let stem = filename.strip_suffix(".json")?;
    let parts: Vec<&str> = stem.rsplitn(8, '-').collect();
    let [request_id, ss, mm, hh, day, month, year, head] = parts.as_slice() else {
        return None;
    };
    if request_id.is_empty() || !request_id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    let (backend, model) = head.split_once("-response-")?;
    if backend.parse::<BackendKind>().is_err() || model.is_empty() {
        return None;
    }
    let date = NaiveDate::parse_from_str(&format!("{year}-{month}-{day}"), "%Y-%m-%d").ok()?;
    let time = NaiveTime::parse_from_str(&format!("{hh}:{mm}:{ss}"), "%H:%M:%S").ok()?;
    Some(ParsedName {
        backend: backend.to_string(),
        model: model.to_string(),
        date,
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response_log::{LogMetadata, REDACTED};
    use crate::types::TokenUsage;
    use chrono::TimeZone;
    use serde_json::json;

    fn entry_at(backend: BackendKind, model: &str, days_ago: i64) -> LogEntry {
        let mut entry = LogEntry::new(
            backend,
            model,
            "What is in this image?",
            "https://cdn.example.com/cam/7.jpg",
            Some(json!({"candidates": [{"content": {"parts": [{"text": "a cat"}]}}]})),
            LogMetadata {
                processing_time_ms: 40,
                tokens: Some(TokenUsage::estimated(264, 2)),
            },
            None,
        );
        entry.timestamp = Utc::now() - chrono::Duration::days(days_ago);
        entry
    }

    #[test]
    fn test_filename_layout() {
        let mut entry = entry_at(BackendKind::Gemini, "gemini-1.5-flash", 0);
        entry.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 9).unwrap();
        entry.request_id = "Ab3dE9xYz0".to_string();
        assert_eq!(
            FileResponseLog::filename_for(&entry),
            "gemini-response-gemini-1.5-flash-2024-05-01-13-45-09-Ab3dE9xYz0.json"
        );
    }

    #[test]
    fn test_parse_filename_with_hyphenated_model() {
        let parsed =
            parse_filename("gemini-response-gemini-2.0-flash-exp-2024-12-31-23-59-58-abc123.json")
                .unwrap();
        assert_eq!(parsed.backend, "gemini");
        assert_eq!(parsed.model, "gemini-2.0-flash-exp");
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(parse_filename("notes.json").is_none());
        assert!(parse_filename("gemini-response-x-2024-13-01-00-00-00-a.json").is_none());
    }

    #[test]
    fn test_sanitize_model() {
        assert_eq!(sanitize_model("models/gemini-pro"), "models_gemini-pro");
        assert_eq!(sanitize_model(""), "unknown");
    }

    #[test]
    fn test_write_list_read() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path().join("logs"));

        log.record(entry_at(BackendKind::Gemini, "gemini-1.5-flash", 0));
        log.record(entry_at(BackendKind::Gpt, "gpt-4o-mini", 3));

        let all = log.list(None, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].backend, "gemini");
        assert!(all[0].size_bytes > 0);

        let today = Utc::now().date_naive();
        let recent = log.list(Some(today), Some(today)).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].model, "gemini-1.5-flash");

        let content = log.read(&recent[0].filename).unwrap();
        let parsed: LogEntry = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.backend, BackendKind::Gemini);
        assert_eq!(parsed.metadata.tokens.unwrap().total, 266);
    }

    #[test]
    fn test_large_base64_payload_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path());
        let entry = LogEntry::new(
            BackendKind::Gemini,
            "gemini-1.5-flash",
            "label",
            "upload.jpg",
            Some(json!({"data": "Zm9v".repeat(12_500)})),
            LogMetadata {
                processing_time_ms: 5,
                tokens: None,
            },
            None,
        );
        let path = log.write(&entry).unwrap();

        let size = std::fs::metadata(&path).unwrap().len();
        assert!(size < 2_000, "log file unexpectedly large: {size} bytes");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains(REDACTED));
        assert!(!content.contains("Zm9vZm9v"));
    }

    #[test]
    fn test_read_rejects_traversal_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path());
        assert!(matches!(
            log.read("../secrets.json"),
            Err(LogError::InvalidFilename(_))
        ));
        assert!(matches!(
            log.read("gemini-response-m-2024-01-01-00-00-00-abc.json"),
            Err(LogError::NotFound(_))
        ));
    }

    #[test]
    fn test_purge_by_age_and_all() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path());
        log.record(entry_at(BackendKind::Gemini, "gemini-1.5-flash", 0));
        log.record(entry_at(BackendKind::Gemini, "gemini-1.5-flash", 10));
        log.record(entry_at(BackendKind::Gpt, "gpt-4o", 40));
        std::fs::write(dir.path().join("keep-me.txt"), "unrelated").unwrap();

        assert_eq!(log.purge(30).unwrap(), 1);
        assert_eq!(log.list(None, None).unwrap().len(), 2);

        assert_eq!(log.purge(0).unwrap(), 2);
        assert!(log.list(None, None).unwrap().is_empty());
        assert!(dir.path().join("keep-me.txt").exists());
    }

    #[test]
    fn test_unwritable_dir_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not dir").unwrap();
        let log = FileResponseLog::new(blocker.join("logs"));
        // Must not panic
        log.record(entry_at(BackendKind::Gemini, "gemini-1.5-flash", 0));
        assert!(log.write(&entry_at(BackendKind::Gpt, "gpt-4o", 0)).is_err());
    }

    #[tokio::test]
    async fn test_record_in_runtime_writes_off_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path().join("logs"));
        log.record(entry_at(BackendKind::Gemini, "gemini-1.5-flash", 0));

        let mut listed = Vec::new();
        for _ in 0..100 {
            listed = log.run_blocking(|log| log.list(None, None)).await.unwrap();
            if !listed.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].model, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileResponseLog::new(dir.path());
        let err = log
            .run_blocking(|log| log.read("../secrets.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::InvalidFilename(_)));
    }
}
