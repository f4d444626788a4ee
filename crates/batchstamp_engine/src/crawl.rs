use std::fs;
use std::path::Path;
use std::sync::{mpsc, Arc};

use batchstamp_core::{
    matches_extension, CrawlEvent, IncludeDir, InputSpec, JobId, JobRegistry, StopReason,
};
use stamp_logging::{stamp_debug, stamp_info};
use walkdir::WalkDir;

use crate::space::PartitionTable;
use crate::EngineEvent;

pub trait CrawlSink: Send + Sync {
    fn emit(&self, event: CrawlEvent);
}

pub struct ChannelCrawlSink {
    tx: mpsc::Sender<EngineEvent>,
}

impl ChannelCrawlSink {
    pub fn new(tx: mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl CrawlSink for ChannelCrawlSink {
    fn emit(&self, event: CrawlEvent) {
        let _ = self.tx.send(EngineEvent::Crawl(event));
    }
}

/// Background search for candidate files. Checks the registry before every
/// directory and after every decision, and always finishes with `Done`.
/// Include and exclude directories are made absolute on construction, so
/// found paths under an include directory are absolute too.
pub struct DiskCrawlJob {
    job_id: JobId,
    input: InputSpec,
    extensions: Vec<String>,
    registry: Arc<JobRegistry>,
    partitions: PartitionTable,
}

impl DiskCrawlJob {
    pub fn new(
        job_id: JobId,
        input: InputSpec,
        extensions: Vec<String>,
        registry: Arc<JobRegistry>,
        partitions: PartitionTable,
    ) -> Self {
        Self {
            job_id,
            input: input.with_absolute_dirs(),
            extensions,
            registry,
            partitions,
        }
    }

    pub fn run(&self, sink: &dyn CrawlSink) {
        let stopped = self.crawl(sink).err();
        match stopped {
            Some(reason) => stamp_info!("Crawl job {} stopped early: {:?}", self.job_id, reason),
            None => stamp_debug!("Crawl job {} finished", self.job_id),
        }
        sink.emit(CrawlEvent::Done {
            job_id: self.job_id,
            stopped,
        });
    }

    fn check(&self) -> Result<(), StopReason> {
        match self.registry.stop_reason(self.job_id) {
            Some(reason) => Err(reason),
            None => Ok(()),
        }
    }

    fn crawl(&self, sink: &dyn CrawlSink) -> Result<(), StopReason> {
        self.check()?;
        if let Some(file) = &self.input.file {
            self.visit_single_file(file, sink)?;
        }

        let count = self.input.include.len();
        for (index, dir) in self.input.include.iter().enumerate() {
            self.check()?;
            let base = index as f64 / count as f64;
            let span = 1.0 / count as f64;
            if self.input.is_excluded(&dir.path) {
                self.exclude(&dir.path, sink);
                continue;
            }
            sink.emit(CrawlEvent::ProcessingPath {
                job_id: self.job_id,
                path: dir.path.clone(),
                progress: base,
            });
            self.walk(dir, base, span, sink)?;
        }
        Ok(())
    }

    fn visit_single_file(&self, file: &Path, sink: &dyn CrawlSink) -> Result<(), StopReason> {
        match fs::metadata(file) {
            Ok(meta) if meta.is_file() => self.found(file, meta.len(), sink),
            _ => self.exclude(file, sink),
        }
        self.check()
    }

    fn walk(
        &self,
        dir: &IncludeDir,
        base: f64,
        span: f64,
        sink: &dyn CrawlSink,
    ) -> Result<(), StopReason> {
        // Top-level entry count refines progress inside one include directory.
        let top_level = fs::read_dir(&dir.path)
            .map(|entries| entries.count())
            .unwrap_or(0)
            .max(1);
        let mut top_seen = 0usize;

        let mut walker = WalkDir::new(&dir.path)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        if !dir.recursive {
            walker = walker.max_depth(1);
        }

        let mut entries = walker.into_iter();
        while let Some(entry) = entries.next() {
            self.check()?;
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(dir.path.as_path()).to_path_buf();
                    stamp_debug!("Skipping unreadable path {}: {}", path.display(), err);
                    self.exclude(&path, sink);
                    continue;
                }
            };

            let path = entry.path();
            if entry.depth() == 1 {
                top_seen += 1;
            }
            if self.input.is_excluded(path) {
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
                self.exclude(path, sink);
                continue;
            }

            if entry.file_type().is_dir() {
                let fraction = (top_seen as f64 / top_level as f64).min(1.0);
                sink.emit(CrawlEvent::ProcessingPath {
                    job_id: self.job_id,
                    path: path.to_path_buf(),
                    progress: base + span * fraction,
                });
                continue;
            }

            if !matches_extension(path, &self.extensions) {
                continue;
            }
            // Follows symlinks; a broken link is excluded like any unreadable file.
            match fs::metadata(path) {
                Ok(meta) if meta.is_file() => self.found(path, meta.len(), sink),
                Ok(_) => {}
                Err(_) => self.exclude(path, sink),
            }
            self.check()?;
        }
        Ok(())
    }

    fn found(&self, path: &Path, size: u64, sink: &dyn CrawlSink) {
        sink.emit(CrawlEvent::FoundFile {
            job_id: self.job_id,
            path: path.to_path_buf(),
            partition: self.partitions.partition_of(path),
            size,
        });
    }

    fn exclude(&self, path: &Path, sink: &dyn CrawlSink) {
        sink.emit(CrawlEvent::ExcludingPath {
            job_id: self.job_id,
            path: path.to_path_buf(),
        });
    }
}
