use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use batchstamp_core::{
    update, BatchReport, BatchSession, BatchState, Disposition, Effect, InputSpec, JobRegistry,
    Msg, StampOptions,
};
use batchstamp_engine::{
    EngineConfig, EngineEvent, EngineEvents, EngineHandle, FailureKind, FreeSpaceProbe,
    PartitionTable, StampError, StampOutcome, Timestamper,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(stamp_logging::initialize_for_tests);
}

#[derive(Default)]
struct FakeTimestamper {
    server_error: Option<StampError>,
    failing: Vec<String>,
    stamped: Mutex<Vec<PathBuf>>,
}

#[async_trait::async_trait]
impl Timestamper for FakeTimestamper {
    async fn test_connectivity(&self, _url: &str, _digest: &[u8; 32]) -> Result<(), StampError> {
        match &self.server_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn stamp_file(
        &self,
        _url: &str,
        input: &Path,
        output: &Path,
    ) -> Result<StampOutcome, StampError> {
        self.stamped.lock().unwrap().push(input.to_path_buf());
        let name = input.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if self.failing.iter().any(|failing| failing == name) {
            return Err(StampError::new(FailureKind::HttpStatus(500), "boom"));
        }
        Ok(StampOutcome {
            output: output.to_path_buf(),
            reply_bytes: 7,
        })
    }
}

struct FixedProbe(u64);

struct BrokenProbe;

impl FreeSpaceProbe for BrokenProbe {
    fn available(&self, _partitions: &[PathBuf]) -> BTreeMap<PathBuf, u64> {
        panic!("disk table unreadable");
    }
}

impl FreeSpaceProbe for FixedProbe {
    fn available(&self, partitions: &[PathBuf]) -> BTreeMap<PathBuf, u64> {
        partitions.iter().map(|p| (p.clone(), self.0)).collect()
    }
}

/// Plays the presentation layer: executes effects against the engine and
/// feeds engine events back into `update` until the batch finishes.
struct Driver {
    session: BatchSession,
    engine: EngineHandle,
    events: EngineEvents,
    queue: VecDeque<Msg>,
    log: Vec<String>,
    report: Option<BatchReport>,
    proceed_on_low_space: bool,
}

impl Driver {
    fn new(timestamper: Arc<FakeTimestamper>, free_bytes: u64, partitions: PartitionTable) -> Self {
        Self::with_probe(timestamper, Arc::new(FixedProbe(free_bytes)), partitions)
    }

    fn with_probe(
        timestamper: Arc<FakeTimestamper>,
        probe: Arc<dyn FreeSpaceProbe>,
        partitions: PartitionTable,
    ) -> Self {
        init_logging();
        let registry = Arc::new(JobRegistry::new());
        let (engine, events) = EngineHandle::with_collaborators(
            EngineConfig::default(),
            registry.clone(),
            timestamper,
            probe,
            partitions,
        )
        .expect("engine");
        Self {
            session: BatchSession::new(registry),
            engine,
            events,
            queue: VecDeque::new(),
            log: Vec::new(),
            report: None,
            proceed_on_low_space: true,
        }
    }

    fn run(&mut self, input: InputSpec, mut after: impl FnMut(&Msg) -> Option<Msg>) -> BatchReport {
        self.queue.push_back(Msg::Start {
            options: StampOptions {
                time_server_url: "http://tsa.invalid/tsa".to_string(),
                ..StampOptions::default()
            },
            input,
        });
        while self.report.is_none() {
            let msg = match self.queue.pop_front() {
                Some(msg) => msg,
                None => self.next_engine_msg(),
            };
            let follow_up = after(&msg);
            let session = std::mem::take(&mut self.session);
            let (session, effects) = update(session, msg);
            self.session = session;
            for effect in effects {
                self.execute(effect);
            }
            self.queue.extend(follow_up);
        }
        self.report.clone().expect("report")
    }

    fn next_engine_msg(&self) -> Msg {
        let event = self
            .events
            .recv_timeout(Duration::from_secs(10))
            .expect("engine event");
        match event {
            EngineEvent::ServerTested(result) => {
                Msg::ServerTested(result.map_err(|e| e.to_string()))
            }
            EngineEvent::Crawl(event) => Msg::Crawl(event),
            EngineEvent::FreeSpace(available) => Msg::FreeSpace(available),
            EngineEvent::FileStamped { index, result } => Msg::FileStamped {
                index,
                result: result.map(|_| ()).map_err(|e| e.to_string()),
            },
            EngineEvent::Fatal(error) => Msg::Fatal(error),
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::OpenLog => self.queue.push_back(Msg::LogOpened {
                path: PathBuf::from("batch.log"),
            }),
            Effect::AppendLog(line) => self.log.push(line),
            Effect::CloseLog => {}
            Effect::TestServer { url, digest } => self.engine.test_server(url, digest),
            Effect::SpawnCrawl {
                job_id,
                input,
                extensions,
            } => self.engine.spawn_crawl(job_id, input, extensions),
            Effect::QueryFreeSpace { partitions } => self.engine.query_free_space(partitions),
            Effect::ConfirmLowSpace { .. } => self.queue.push_back(if self.proceed_on_low_space {
                Msg::LowSpaceProceed
            } else {
                Msg::LowSpaceAbort
            }),
            Effect::PresentSelection { files } => self.queue.push_back(Msg::SelectionConfirmed(
                files.into_iter().map(|f| f.path).collect(),
            )),
            Effect::StampFile {
                index,
                url,
                input,
                output,
                ..
            } => self.engine.stamp(index, url, input, output),
            Effect::BatchFinished(report) => self.report = Some(report),
        }
    }

    fn count_lines(&self, marker: &str) -> usize {
        self.log
            .iter()
            .filter(|line| line.split_whitespace().any(|word| word == marker))
            .count()
    }
}

fn docs_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    for name in ["a.ddoc", "b.bdoc", "c.ddoc"] {
        fs::write(temp.path().join(name), name).unwrap();
    }
    fs::write(temp.path().join("notes.txt"), "skip me").unwrap();
    temp
}

#[test]
fn three_matching_files_are_all_stamped() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::new(timestamper.clone(), u64::MAX, PartitionTable::default());

    let report = driver.run(InputSpec::directory(temp.path(), false), |_| None);

    assert_eq!(driver.session.state(), BatchState::Done);
    assert_eq!(report.disposition, Disposition::Completed);
    assert_eq!(report.cnt_found, 3);
    assert_eq!(report.progress_success, 3);
    assert_eq!(report.progress_failed, 0);
    assert!(report.success);
    assert_eq!(driver.count_lines("DONE"), 3);
    assert_eq!(driver.count_lines("Found"), 3);
    assert_eq!(timestamper.stamped.lock().unwrap().len(), 3);
}

#[test]
fn cancel_after_first_conversion_stops_batch() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::new(timestamper, u64::MAX, PartitionTable::default());

    let report = driver.run(InputSpec::directory(temp.path(), false), |msg| match msg {
        Msg::FileStamped { index: 0, .. } => Some(Msg::Cancel),
        _ => None,
    });

    assert_eq!(driver.session.state(), BatchState::Cancelled);
    assert_eq!(report.disposition, Disposition::Cancelled);
    assert!(!report.success);
    assert_eq!(driver.count_lines("DONE"), 1);
    assert_eq!(driver.count_lines("FAILED"), 0);
}

#[test]
fn empty_crawl_finishes_without_converting() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("readme.txt"), "x").unwrap();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::new(
        timestamper.clone(),
        0,
        PartitionTable::new(vec![temp.path().to_path_buf()]),
    );

    let report = driver.run(InputSpec::directory(temp.path(), true), |_| None);

    assert_eq!(driver.session.state(), BatchState::Done);
    assert_eq!(report.cnt_found, 0);
    assert!(report.success);
    assert!(timestamper.stamped.lock().unwrap().is_empty());
    assert_eq!(driver.log, vec!["No matching files found".to_string()]);
}

#[test]
fn server_timeout_fails_before_crawling() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper {
        server_error: Some(StampError::new(FailureKind::Timeout, "operation timed out")),
        ..FakeTimestamper::default()
    });
    let mut driver = Driver::new(timestamper.clone(), u64::MAX, PartitionTable::default());

    let report = driver.run(InputSpec::directory(temp.path(), false), |msg| {
        assert!(!matches!(msg, Msg::Crawl(_)), "crawl must not run");
        None
    });

    assert_eq!(driver.session.state(), BatchState::Failed);
    assert!(!report.success);
    assert!(report.is_system_error);
    assert!(report.error.as_deref().unwrap_or_default().contains("timeout"));
    assert!(timestamper.stamped.lock().unwrap().is_empty());
}

#[test]
fn failed_file_does_not_stop_the_batch() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper {
        failing: vec!["b.bdoc".to_string()],
        ..FakeTimestamper::default()
    });
    let mut driver = Driver::new(timestamper, u64::MAX, PartitionTable::default());

    let report = driver.run(InputSpec::directory(temp.path(), false), |_| None);

    assert_eq!(report.disposition, Disposition::Completed);
    assert_eq!(report.progress_success, 2);
    assert_eq!(report.progress_failed, 1);
    assert!(report.success);
    assert_eq!(driver.count_lines("FAILED"), 1);
}

#[test]
fn low_space_abort_cancels_before_stamping() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::new(
        timestamper.clone(),
        0,
        PartitionTable::new(vec![temp.path().to_path_buf()]),
    );
    driver.proceed_on_low_space = false;

    let report = driver.run(InputSpec::directory(temp.path(), false), |_| None);

    assert_eq!(report.disposition, Disposition::Cancelled);
    assert!(timestamper.stamped.lock().unwrap().is_empty());
}

#[test]
fn low_space_proceed_stamps_everything() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::new(
        timestamper.clone(),
        0,
        PartitionTable::new(vec![temp.path().to_path_buf()]),
    );

    let report = driver.run(InputSpec::directory(temp.path(), false), |_| None);

    assert_eq!(report.disposition, Disposition::Completed);
    assert_eq!(report.progress_success, 3);
}

#[test]
fn crashed_background_task_fails_the_batch() {
    let temp = docs_dir();
    let timestamper = Arc::new(FakeTimestamper::default());
    let mut driver = Driver::with_probe(
        timestamper.clone(),
        Arc::new(BrokenProbe),
        PartitionTable::new(vec![temp.path().to_path_buf()]),
    );

    let report = driver.run(InputSpec::directory(temp.path(), false), |_| None);

    assert_eq!(driver.session.state(), BatchState::Failed);
    assert_eq!(report.disposition, Disposition::Failed);
    assert!(!report.success);
    assert!(report.is_system_error);
    assert!(report
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("Free disk space check failed"));
    assert!(timestamper.stamped.lock().unwrap().is_empty());
    assert_eq!(driver.count_lines("DONE"), 0);
}
