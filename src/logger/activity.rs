//! Activity logging for rule decisions.
//!
//! Rules send [`ActivityEvent`]s through a cloneable [`ActivityLoggerHandle`]
//! backed by a bounded crossbeam channel. `send()` never blocks, so a slow log
//! disk cannot stall evaluation; overflow is counted instead. A dedicated
//! logger thread turns events into JSONL lines.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use chrono::{DateTime, SecondsFormat, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{JanitorError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
pub const CHANNEL_CAPACITY: usize = 1024;

/// Decisions and failures worth a log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    /// The owner exempted the resource with the opt-out sentinel.
    OptedOut { resource_id: String, rule: String },
    /// The owner's tagged date was applied.
    OwnerDateApplied {
        resource_id: String,
        rule: String,
        tag_value: String,
        termination_time: DateTime<Utc>,
    },
    /// The janitor tag was neither the sentinel nor a date; default logic ran.
    MalformedJanitorTag {
        resource_id: String,
        rule: String,
        tag_value: String,
    },
    ResourceMarked {
        resource_id: String,
        rule: String,
        termination_time: DateTime<Utc>,
        reason: String,
    },
    /// A rule matched but an earlier mark was kept.
    AlreadyMarked {
        resource_id: String,
        rule: String,
        termination_time: DateTime<Utc>,
    },
    /// A variant check ran and found the resource not eligible.
    NotEligible {
        resource_id: String,
        rule: String,
        details: String,
    },
    EvaluationFailed {
        resource_id: String,
        error_code: String,
        error_message: String,
    },
    BatchCompleted {
        evaluated: usize,
        marked: usize,
        failed: usize,
        duration_ms: u64,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

/// Thread-safe, cheaply-cloneable handle for sending log events.
#[derive(Debug, Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// A handle plus the receiving end, for embedders that route events themselves.
    pub fn channel(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Send an event. Non-blocking; a full channel drops the event and bumps
    /// the dropped counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and exit.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }
}

/// Spawn the logger thread writing to `jsonl_config`.
pub fn spawn_logger(
    jsonl_config: JsonlConfig,
    channel_capacity: usize,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (handle, rx) = ActivityLoggerHandle::channel(channel_capacity);
    let dropped = Arc::clone(&handle.dropped_events);

    let join = thread::Builder::new()
        .name("vjan-logger".to_string())
        .spawn(move || logger_thread_main(&rx, jsonl_config, &dropped))
        .map_err(|e| JanitorError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::Error, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        if let Some(entry) = event_to_log_entry(&event) {
            jsonl.write_entry(&entry);
        }
    }

    jsonl.flush();
    jsonl.fsync();
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// JSONL form of an event. `None` for the shutdown sentinel.
pub fn event_to_log_entry(event: &ActivityEvent) -> Option<LogEntry> {
    let entry = match event {
        ActivityEvent::OptedOut { resource_id, rule } => {
            let mut e = LogEntry::new(EventType::OptOut, Severity::Info);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.details = Some("tagged as not handled by janitor".to_string());
            e
        }
        ActivityEvent::OwnerDateApplied {
            resource_id,
            rule,
            tag_value,
            termination_time,
        } => {
            let mut e = LogEntry::new(EventType::OwnerDate, Severity::Info);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.tag_value = Some(tag_value.clone());
            e.termination_time = Some(rfc3339(*termination_time));
            e
        }
        ActivityEvent::MalformedJanitorTag {
            resource_id,
            rule,
            tag_value,
        } => {
            let mut e = LogEntry::new(EventType::MalformedTag, Severity::Error);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.tag_value = Some(tag_value.clone());
            e.details = Some(format!(
                "the janitor tag is not a user specified date: {tag_value}"
            ));
            e
        }
        ActivityEvent::ResourceMarked {
            resource_id,
            rule,
            termination_time,
            reason,
        } => {
            let mut e = LogEntry::new(EventType::Marked, Severity::Info);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.termination_time = Some(rfc3339(*termination_time));
            e.reason = Some(reason.clone());
            e.ok = Some(true);
            e
        }
        ActivityEvent::AlreadyMarked {
            resource_id,
            rule,
            termination_time,
        } => {
            let mut e = LogEntry::new(EventType::AlreadyMarked, Severity::Info);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.termination_time = Some(rfc3339(*termination_time));
            e
        }
        ActivityEvent::NotEligible {
            resource_id,
            rule,
            details,
        } => {
            let mut e = LogEntry::new(EventType::NotEligible, Severity::Info);
            e.resource_id = Some(resource_id.clone());
            e.rule = Some(rule.clone());
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::EvaluationFailed {
            resource_id,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::EvaluationFailed, Severity::Error);
            e.resource_id = Some(resource_id.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::BatchCompleted {
            evaluated,
            marked,
            failed,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::BatchComplete, Severity::Info);
            e.duration_ms = Some(*duration_ms);
            e.details = Some(format!(
                "evaluated={evaluated} marked={marked} failed={failed}"
            ));
            e.ok = Some(*failed == 0);
            e
        }
        ActivityEvent::Shutdown => return None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_config(dir: &std::path::Path) -> JsonlConfig {
        JsonlConfig {
            path: dir.join("test.jsonl"),
            fallback_path: None,
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 60,
        }
    }

    fn marked_event() -> ActivityEvent {
        ActivityEvent::ResourceMarked {
            resource_id: "vol-1".to_string(),
            rule: "delete_on_termination".to_string(),
            termination_time: Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 0).unwrap(),
            reason: "Not attached and DeleteOnTerminate flag was set".to_string(),
        }
    }

    #[test]
    fn spawn_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path()), 64).unwrap();
        handle.send(marked_event());
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 1);
        let parsed: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed["event"], "marked");
        assert_eq!(parsed["termination_time"], "2024-03-18T00:00:00Z");
    }

    #[test]
    fn handles_cloneable_and_send() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, join) = spawn_logger(test_config(dir.path()), 64).unwrap();
        let h2 = handle.clone();

        let worker = std::thread::spawn(move || {
            h2.send(ActivityEvent::OptedOut {
                resource_id: "vol-2".to_string(),
                rule: "delete_on_termination".to_string(),
            });
        });
        worker.join().unwrap();
        handle.send(marked_event());
        handle.shutdown();
        join.join().unwrap();

        let contents = std::fs::read_to_string(dir.path().join("test.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn full_channel_counts_drops() {
        let (handle, rx) = ActivityLoggerHandle::channel(1);
        handle.send(marked_event());
        handle.send(marked_event());
        handle.send(marked_event());
        assert_eq!(handle.dropped_events(), 2);
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn malformed_tag_is_error_severity() {
        let entry = event_to_log_entry(&ActivityEvent::MalformedJanitorTag {
            resource_id: "vol-3".to_string(),
            rule: "delete_on_termination".to_string(),
            tag_value: "not-a-date".to_string(),
        })
        .unwrap();
        assert_eq!(entry.severity, Severity::Error);
        assert_eq!(entry.tag_value.as_deref(), Some("not-a-date"));
        assert!(entry.details.unwrap().contains("not-a-date"));
    }

    #[test]
    fn batch_with_failures_is_not_ok() {
        let entry = event_to_log_entry(&ActivityEvent::BatchCompleted {
            evaluated: 10,
            marked: 3,
            failed: 1,
            duration_ms: 5,
        })
        .unwrap();
        assert_eq!(entry.ok, Some(false));
        assert_eq!(entry.details.as_deref(), Some("evaluated=10 marked=3 failed=1"));
    }

    #[test]
    fn shutdown_has_no_log_line() {
        assert!(event_to_log_entry(&ActivityEvent::Shutdown).is_none());
    }
}
