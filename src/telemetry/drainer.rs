//! # Telemetry Drainer
//!
//! Replays the durable journal to the remote store, line by line, and
//! compacts it so that only unsent or unparseable lines remain.
//!
//! ## Drain Pass
//!
//! 1. Absent or empty journal: delete it, switch back to normal mode, done.
//! 2. Open a [`Checkpoint`](super::journal::Checkpoint) over the journal.
//! 3. For each line in file order:
//!    - link up and line parses: upload it; the write counts as sent
//!    - link up but line does not parse (or is not UTF-8): keep it verbatim
//!    - link down: keep it untouched
//! 4. At least one line sent: commit the checkpoint. Nothing sent: discard it,
//!    leaving the journal byte-for-byte as it was.
//! 5. Switch back to normal mode, also when the pass was aborted.
//!
//! The store's answer is not checked for delivery: a status outside 2xx or a
//! transport failure is logged and counted as rejected, but the line is still
//! removed.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::journal::Journal;
use super::record::TelemetryRecord;
use super::remote::RemoteStore;
use crate::error::{GreenhouseError, Result};
use crate::network::link::Link;
use crate::network::{ModeFlag, OperatingMode};

/// How a drain pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Journal was absent or empty
    Empty,
    /// Journal replaced by the retained lines
    Committed,
    /// Nothing was sent; journal left untouched
    KeptOriginal,
}

/// Summary of one drain pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Records for which a write was issued
    pub uploaded: usize,
    /// Of those, how many were not answered with 2xx
    pub rejected: usize,
    /// Lines left in the journal
    pub retained: usize,
}

impl DrainReport {
    fn empty() -> Self {
        Self {
            outcome: DrainOutcome::Empty,
            uploaded: 0,
            rejected: 0,
            retained: 0,
        }
    }
}

/// Drains the journal to the remote store
pub struct TelemetryDrainer {
    journal: Journal,
    remote: Arc<dyn RemoteStore>,
    link: Arc<dyn Link>,
    mode: ModeFlag,
}

impl TelemetryDrainer {
    pub fn new(journal: Journal, remote: Arc<dyn RemoteStore>, link: Arc<dyn Link>, mode: ModeFlag) -> Self {
        Self {
            journal,
            remote,
            link,
            mode,
        }
    }

    /// Run one drain pass
    ///
    /// The mode is switched back to normal however the pass ends, so a
    /// storage fault never keeps the sensor/actuator cycle paused. The
    /// connectivity monitor re-arms drain-only on its next poll.
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Storage` if the journal or scratch file
    /// cannot be opened or written. The journal is left untouched.
    pub async fn drain(&self) -> Result<DrainReport> {
        let result = self.pass().await;
        self.finish();
        result
    }

    async fn pass(&self) -> Result<DrainReport> {
        if self.journal.is_empty()? {
            if self.journal.exists() {
                debug!("Removing empty journal {}", self.journal.path().display());
            }
            self.journal.remove()?;
            return Ok(DrainReport::empty());
        }

        let mut checkpoint = self.journal.checkpoint()?;
        let mut read = 0;
        let mut uploaded = 0;
        let mut rejected = 0;

        while let Some(line) = checkpoint.next_line()? {
            read += 1;
            if !self.link.is_connected() {
                checkpoint.retain(&line)?;
                continue;
            }

            let parsed = std::str::from_utf8(&line)
                .map_err(|e| GreenhouseError::Parse(format!("line is not valid UTF-8: {}", e)))
                .and_then(TelemetryRecord::parse_line);
            let record = match parsed {
                Ok(record) => record,
                Err(e) => {
                    warn!("Keeping unparseable line for retry: {}", e);
                    checkpoint.retain(&line)?;
                    continue;
                }
            };

            // Issuing the write counts as sent, whatever the store answers
            let key = record.remote_key();
            uploaded += 1;
            match self.remote.put(&key, &record.payload()).await {
                Ok(status) if (200..300).contains(&status) => {
                    debug!(key = %key, status, "Record uploaded");
                }
                Ok(status) => {
                    rejected += 1;
                    warn!(key = %key, status, "Remote store rejected record, dropping it");
                }
                Err(e) => {
                    rejected += 1;
                    warn!(key = %key, "Upload not confirmed, dropping it: {}", e);
                }
            }
        }

        let (outcome, retained) = if uploaded > 0 {
            let retained = checkpoint.retained();
            checkpoint.commit()?;
            info!(uploaded, retained, "Drain pass committed");
            (DrainOutcome::Committed, retained)
        } else {
            checkpoint.discard()?;
            info!("No data was sent, keeping original journal");
            (DrainOutcome::KeptOriginal, read)
        };

        Ok(DrainReport {
            outcome,
            uploaded,
            rejected,
            retained,
        })
    }

    fn finish(&self) {
        self.mode.set(OperatingMode::Normal);
        info!("Resuming {} operation", OperatingMode::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::link::MockLink;
    use crate::telemetry::remote::mocks::{MockRemoteStore, Reply};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const LINE_1: &str = "2024/05/01 13:00:05, T:24.50C, H:60.20%, L:45%";
    const LINE_2: &str = "2024/05/01 14:00:01, T:25.00C, H:58.75%, L:50%";
    const LINE_3: &str = "2024/05/01 15:00:03, T:25.75C, H:57.00%, L:61%";
    const GARBAGE: &str = "2024/05/01 16:00:0";

    struct Fixture {
        _dir: TempDir,
        journal: Journal,
        remote: MockRemoteStore,
        mode: ModeFlag,
    }

    impl Fixture {
        fn new(lines: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            let journal = Journal::new(dir.path().join("datalog.txt"), dir.path().join("temp.txt"));
            for line in lines {
                journal.append(line).unwrap();
            }
            Self {
                _dir: dir,
                journal,
                remote: MockRemoteStore::new(),
                mode: ModeFlag::new(OperatingMode::DrainOnly),
            }
        }

        fn drainer(&self, link: MockLink) -> TelemetryDrainer {
            TelemetryDrainer::new(
                self.journal.clone(),
                Arc::new(self.remote.clone()),
                Arc::new(link),
                self.mode.clone(),
            )
        }

        fn keys(&self) -> Vec<String> {
            self.remote.get_writes().into_iter().map(|(k, _)| k).collect()
        }
    }

    fn link_up() -> MockLink {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(true);
        link
    }

    fn link_down() -> MockLink {
        let mut link = MockLink::new();
        link.expect_is_connected().return_const(false);
        link
    }

    /// Link that reports up for the first `n` checks, then down
    fn link_up_for(n: usize) -> MockLink {
        let calls = AtomicUsize::new(0);
        let mut link = MockLink::new();
        link.expect_is_connected()
            .returning(move || calls.fetch_add(1, Ordering::SeqCst) < n);
        link
    }

    #[tokio::test]
    async fn test_single_record_uploaded_and_log_deleted() {
        let fx = Fixture::new(&[LINE_1]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.retained, 0);
        assert!(!fx.journal.exists());
        assert!(fx.mode.is_normal());

        let writes = fx.remote.get_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "20240501_130005");
        assert_eq!(
            serde_json::to_value(writes[0].1).unwrap(),
            serde_json::json!({"temperature": 24.5, "humidity": 60.2, "light": 45})
        );
    }

    #[tokio::test]
    async fn test_all_records_uploaded_in_file_order() {
        let fx = Fixture::new(&[LINE_1, LINE_2, LINE_3]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.uploaded, 3);
        assert_eq!(fx.keys(), vec!["20240501_130005", "20240501_140001", "20240501_150003"]);
        assert!(!fx.journal.exists());
    }

    #[tokio::test]
    async fn test_unparseable_line_is_retained() {
        let fx = Fixture::new(&[LINE_1, GARBAGE, LINE_2]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.retained, 1);
        assert_eq!(fx.journal.lines().unwrap(), vec![GARBAGE]);
    }

    #[tokio::test]
    async fn test_link_down_keeps_log_byte_identical() {
        let fx = Fixture::new(&[LINE_1, LINE_2]);
        let before = fs::read(fx.journal.path()).unwrap();

        let report = fx.drainer(link_down()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::KeptOriginal);
        assert_eq!(report.retained, 2);
        assert!(fx.keys().is_empty());
        assert_eq!(fs::read(fx.journal.path()).unwrap(), before);
        assert!(!fx.journal.scratch_path().exists());
        assert!(fx.mode.is_normal());
    }

    #[tokio::test]
    async fn test_only_garbage_keeps_log_byte_identical() {
        let fx = Fixture::new(&[GARBAGE, "another bad line"]);
        let before = fs::read(fx.journal.path()).unwrap();

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::KeptOriginal);
        assert_eq!(fs::read(fx.journal.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn test_transport_failures_still_count_as_sent() {
        let mut fx = Fixture::new(&[LINE_1]);
        fx.remote = MockRemoteStore::with_replies([Reply::TransportError]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.rejected, 1);
        assert!(!fx.journal.exists());
        assert!(fx.mode.is_normal());
    }

    #[tokio::test]
    async fn test_mixed_replies_drop_every_parsed_line() {
        let mut fx = Fixture::new(&[LINE_1, GARBAGE, LINE_2, LINE_3]);
        fx.remote = MockRemoteStore::with_replies([Reply::Status(200), Reply::TransportError, Reply::Status(500)]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.uploaded, 3);
        assert_eq!(report.rejected, 2);
        assert_eq!(fx.journal.lines().unwrap(), vec![GARBAGE]);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_retained_verbatim() {
        let fx = Fixture::new(&[]);
        let torn: &[u8] = b"2024/05/01 14:00:\xff\xfe garbage";
        let mut contents = format!("{}\r\n", LINE_1).into_bytes();
        contents.extend_from_slice(torn);
        contents.extend_from_slice(format!("\r\n{}\r\n", LINE_3).as_bytes());
        fs::write(fx.journal.path(), &contents).unwrap();

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.retained, 1);
        assert_eq!(fx.keys(), vec!["20240501_130005", "20240501_150003"]);
        let mut expected = torn.to_vec();
        expected.extend_from_slice(b"\r\n");
        assert_eq!(fs::read(fx.journal.path()).unwrap(), expected);
        assert!(fx.mode.is_normal());
    }

    #[tokio::test]
    async fn test_rejected_status_still_counts_as_sent() {
        let mut fx = Fixture::new(&[LINE_1]);
        fx.remote = MockRemoteStore::with_replies([Reply::Status(401)]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.rejected, 1);
        assert!(!fx.journal.exists());
    }

    #[tokio::test]
    async fn test_link_drop_mid_pass_retains_remaining_lines() {
        let fx = Fixture::new(&[LINE_1, LINE_2, LINE_3]);

        let report = fx.drainer(link_up_for(1)).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Committed);
        assert_eq!(fx.keys(), vec!["20240501_130005"]);
        assert_eq!(fx.journal.lines().unwrap(), vec![LINE_2, LINE_3]);
    }

    #[tokio::test]
    async fn test_absent_log_is_noop() {
        let fx = Fixture::new(&[]);

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report, DrainReport::empty());
        assert!(!fx.journal.exists());
        assert!(fx.mode.is_normal());
    }

    #[tokio::test]
    async fn test_empty_log_file_is_deleted() {
        let fx = Fixture::new(&[]);
        fs::File::create(fx.journal.path()).unwrap();

        let report = fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(report.outcome, DrainOutcome::Empty);
        assert!(!fx.journal.exists());
        assert!(fx.mode.is_normal());
    }

    #[tokio::test]
    async fn test_scratch_open_failure_leaves_log_and_resumes_normal() {
        let dir = TempDir::new().unwrap();
        // Scratch path inside a missing directory cannot be created
        let journal = Journal::new(dir.path().join("datalog.txt"), dir.path().join("missing/temp.txt"));
        journal.append(LINE_1).unwrap();
        let before = fs::read(journal.path()).unwrap();
        let mode = ModeFlag::new(OperatingMode::DrainOnly);
        let remote = MockRemoteStore::new();

        let drainer = TelemetryDrainer::new(journal.clone(), Arc::new(remote.clone()), Arc::new(link_up()), mode.clone());
        let result = drainer.drain().await;

        assert!(matches!(result, Err(GreenhouseError::Storage { .. })));
        assert_eq!(fs::read(journal.path()).unwrap(), before);
        assert!(remote.get_writes().is_empty());
        assert!(mode.is_normal());
    }

    #[tokio::test]
    async fn test_lines_appended_after_pass_survive_next_pass() {
        let fx = Fixture::new(&[LINE_1, GARBAGE]);
        fx.drainer(link_up()).drain().await.unwrap();

        fx.journal.append(LINE_2).unwrap();
        fx.drainer(link_up()).drain().await.unwrap();

        assert_eq!(fx.keys(), vec!["20240501_130005", "20240501_140001"]);
        assert_eq!(fx.journal.lines().unwrap(), vec![GARBAGE]);
    }
}
