use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use batchstamp_core::{CrawlEvent, InputSpec, JobRegistry, StopReason};
use batchstamp_engine::{CrawlSink, DiskCrawlJob, PartitionTable};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

#[derive(Default)]
struct TestSink {
    events: Mutex<Vec<CrawlEvent>>,
    cancel_on_found: Option<Arc<JobRegistry>>,
}

impl TestSink {
    fn take(&self) -> Vec<CrawlEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl CrawlSink for TestSink {
    fn emit(&self, event: CrawlEvent) {
        if let (CrawlEvent::FoundFile { .. }, Some(registry)) = (&event, &self.cancel_on_found) {
            registry.cancel();
        }
        self.events.lock().unwrap().push(event);
    }
}

fn exts() -> Vec<String> {
    vec!["ddoc".to_string(), "bdoc".to_string()]
}

/// root/a.ddoc, root/b.txt, root/sub/c.BDOC, root/sub/deeper/e.ddoc, root/skip/d.ddoc
fn tree() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    fs::write(root.join("a.ddoc"), "aaaa").unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();
    fs::create_dir_all(root.join("sub/deeper")).unwrap();
    fs::write(root.join("sub/c.BDOC"), "cc").unwrap();
    fs::write(root.join("sub/deeper/e.ddoc"), "e").unwrap();
    fs::create_dir_all(root.join("skip")).unwrap();
    fs::write(root.join("skip/d.ddoc"), "d").unwrap();
    temp
}

fn run(input: InputSpec, registry: Arc<JobRegistry>, job_id: u64) -> Vec<CrawlEvent> {
    let sink = TestSink::default();
    DiskCrawlJob::new(job_id, input, exts(), registry, PartitionTable::default()).run(&sink);
    sink.take()
}

fn found_paths(events: &[CrawlEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::FoundFile { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect()
}

fn excluded_paths(events: &[CrawlEvent]) -> Vec<PathBuf> {
    events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::ExcludingPath { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect()
}

fn last_done(events: &[CrawlEvent]) -> Option<Option<StopReason>> {
    match events.last() {
        Some(CrawlEvent::Done { stopped, .. }) => Some(*stopped),
        _ => None,
    }
}

#[test]
fn recursive_crawl_finds_matching_files_and_skips_excluded_dirs() {
    let temp = tree();
    let root = temp.path();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();
    let input = InputSpec {
        exclude: vec![root.join("skip")],
        ..InputSpec::directory(root, true)
    };

    let events = run(input, registry, job_id);

    let mut found = found_paths(&events);
    found.sort();
    assert_eq!(
        found,
        vec![
            root.join("a.ddoc"),
            root.join("sub/c.BDOC"),
            root.join("sub/deeper/e.ddoc"),
        ]
    );
    assert_eq!(excluded_paths(&events), vec![root.join("skip")]);
    assert_eq!(last_done(&events), Some(None));
    assert!(events.iter().all(|event| event.job_id() == job_id));
}

#[test]
fn non_recursive_crawl_stays_at_top_level() {
    let temp = tree();
    let root = temp.path();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();

    let events = run(InputSpec::directory(root, false), registry, job_id);

    assert_eq!(found_paths(&events), vec![root.join("a.ddoc")]);
    assert_eq!(last_done(&events), Some(None));
}

#[test]
fn found_files_carry_size_and_partition() {
    let temp = tree();
    let root = temp.path();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();
    let sink = TestSink::default();
    let partitions = PartitionTable::new(vec![root.to_path_buf()]);

    DiskCrawlJob::new(
        job_id,
        InputSpec::directory(root, false),
        exts(),
        registry,
        partitions,
    )
    .run(&sink);

    let found = sink
        .take()
        .into_iter()
        .find_map(|event| match event {
            CrawlEvent::FoundFile {
                partition, size, ..
            } => Some((partition, size)),
            _ => None,
        })
        .expect("one found file");
    assert_eq!(found, (Some(root.to_path_buf()), 4));
}

#[test]
fn crawl_progress_is_monotonic_and_bounded() {
    let first = tree();
    let second = tree();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();
    let mut input = InputSpec::directory(first.path(), true);
    input.include.extend(InputSpec::directory(second.path(), true).include);

    let events = run(input, registry, job_id);

    let progress: Vec<f64> = events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::ProcessingPath { progress, .. } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(progress.len() >= 4);
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(progress.iter().all(|value| (0.0..=1.0).contains(value)));
    assert_eq!(found_paths(&events).len(), 8);
}

#[test]
fn cancelled_before_start_finds_nothing() {
    let temp = tree();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();
    registry.cancel();

    let events = run(InputSpec::directory(temp.path(), true), registry, job_id);

    assert_eq!(
        events,
        vec![CrawlEvent::Done {
            job_id,
            stopped: Some(StopReason::Cancelled),
        }]
    );
}

#[test]
fn cancel_during_walk_stops_after_current_file() {
    let temp = tree();
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();
    let sink = TestSink {
        cancel_on_found: Some(registry.clone()),
        ..TestSink::default()
    };

    DiskCrawlJob::new(
        job_id,
        InputSpec::directory(temp.path(), true),
        exts(),
        registry,
        PartitionTable::default(),
    )
    .run(&sink);

    let events = sink.take();
    assert_eq!(found_paths(&events).len(), 1);
    assert_eq!(last_done(&events), Some(Some(StopReason::Cancelled)));
}

#[test]
fn superseded_job_stops_without_results() {
    let temp = tree();
    let registry = Arc::new(JobRegistry::new());
    let stale = registry.start_new_job();
    registry.start_new_job();

    let events = run(InputSpec::directory(temp.path(), true), registry, stale);

    assert!(found_paths(&events).is_empty());
    assert_eq!(last_done(&events), Some(Some(StopReason::Superseded)));
}

#[test]
fn single_file_is_reported_regardless_of_extension() {
    let temp = tree();
    let file = temp.path().join("b.txt");
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();

    let events = run(InputSpec::single_file(&file), registry, job_id);

    assert_eq!(found_paths(&events), vec![file]);
    assert_eq!(last_done(&events), Some(None));
}

#[test]
fn missing_single_file_is_excluded() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("gone.ddoc");
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();

    let events = run(InputSpec::single_file(&missing), registry, job_id);

    assert!(found_paths(&events).is_empty());
    assert_eq!(excluded_paths(&events), vec![missing]);
    assert_eq!(last_done(&events), Some(None));
}

#[test]
fn missing_include_dir_still_finishes() {
    let registry = Arc::new(JobRegistry::new());
    let job_id = registry.start_new_job();

    let events = run(
        InputSpec::directory(Path::new("/definitely/not/here"), true),
        registry,
        job_id,
    );

    assert!(found_paths(&events).is_empty());
    assert_eq!(last_done(&events), Some(None));
}

#[test]
fn excludes_match_whatever_spelling_the_include_uses() {
    // Created under the working directory so its path stays relative.
    let temp = TempDir::new_in(".").unwrap();
    assert!(temp.path().is_relative());
    fs::write(temp.path().join("ok.ddoc"), "ok").unwrap();
    fs::create_dir_all(temp.path().join("private")).unwrap();
    fs::write(temp.path().join("private/secret.ddoc"), "s").unwrap();
    let absolute_root = fs::canonicalize(temp.path()).unwrap();
    let registry = Arc::new(JobRegistry::new());

    let relative_include = InputSpec {
        exclude: vec![absolute_root.join("private")],
        ..InputSpec::directory(temp.path(), true)
    };
    let events = run(relative_include, registry.clone(), registry.start_new_job());
    assert_eq!(found_paths(&events), vec![absolute_root.join("ok.ddoc")]);
    assert_eq!(excluded_paths(&events), vec![absolute_root.join("private")]);

    let relative_exclude = InputSpec {
        exclude: vec![temp.path().join("private")],
        ..InputSpec::directory(&absolute_root, true)
    };
    let events = run(relative_exclude, registry.clone(), registry.start_new_job());
    assert_eq!(found_paths(&events), vec![absolute_root.join("ok.ddoc")]);
}
