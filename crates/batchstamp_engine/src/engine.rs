use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use batchstamp_core::{InputSpec, JobId, JobRegistry};
use stamp_logging::{stamp_debug, stamp_warn};

use crate::crawl::{ChannelCrawlSink, DiskCrawlJob};
use crate::space::{FreeSpaceProbe, PartitionTable, SysinfoProbe};
use crate::timestamper::{ReqwestTimestamper, Timestamper, TimestamperSettings};
use crate::{EngineEvent, FailureKind, StampError};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub timestamper: TimestamperSettings,
    /// Upper bound for blocking pool threads running crawl jobs.
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timestamper: TimestamperSettings::default(),
            worker_threads: 2,
        }
    }
}

enum EngineCommand {
    TestServer {
        url: String,
        digest: [u8; 32],
    },
    Crawl {
        job_id: JobId,
        input: InputSpec,
        extensions: Vec<String>,
    },
    QueryFreeSpace {
        partitions: Vec<PathBuf>,
    },
    Stamp {
        index: usize,
        url: String,
        input: PathBuf,
        output: PathBuf,
    },
}

/// Shared by every task the engine runs.
struct EngineContext {
    timestamper: Arc<dyn Timestamper>,
    probe: Arc<dyn FreeSpaceProbe>,
    partitions: PartitionTable,
    registry: Arc<JobRegistry>,
    event_tx: mpsc::Sender<EngineEvent>,
}

/// Command side of the engine. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

/// Event side of the engine; a single consumer drains it in order.
pub struct EngineEvents {
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineEvents {
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

impl EngineHandle {
    /// Engine with the HTTP timestamper and system disk information.
    pub fn new(
        config: EngineConfig,
        registry: Arc<JobRegistry>,
    ) -> Result<(Self, EngineEvents), StampError> {
        let timestamper = ReqwestTimestamper::new(config.timestamper.clone())?;
        Self::with_collaborators(
            config,
            registry,
            Arc::new(timestamper),
            Arc::new(SysinfoProbe),
            PartitionTable::from_system(),
        )
    }

    pub fn with_collaborators(
        config: EngineConfig,
        registry: Arc<JobRegistry>,
        timestamper: Arc<dyn Timestamper>,
        probe: Arc<dyn FreeSpaceProbe>,
        partitions: PartitionTable,
    ) -> Result<(Self, EngineEvents), StampError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(config.worker_threads.max(1))
            .enable_all()
            .build()
            .map_err(|err| StampError::new(FailureKind::Io, err.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let context = Arc::new(EngineContext {
            timestamper,
            probe,
            partitions,
            registry,
            event_tx,
        });

        thread::spawn(move || {
            while let Ok(command) = cmd_rx.recv() {
                let context = context.clone();
                runtime.spawn(async move {
                    handle_command(&context, command).await;
                });
            }
            stamp_debug!("Engine command channel closed");
        });

        Ok((Self { cmd_tx }, EngineEvents { event_rx }))
    }

    pub fn test_server(&self, url: impl Into<String>, digest: [u8; 32]) {
        self.send(EngineCommand::TestServer {
            url: url.into(),
            digest,
        });
    }

    pub fn spawn_crawl(&self, job_id: JobId, input: InputSpec, extensions: Vec<String>) {
        self.send(EngineCommand::Crawl {
            job_id,
            input,
            extensions,
        });
    }

    pub fn query_free_space(&self, partitions: Vec<PathBuf>) {
        self.send(EngineCommand::QueryFreeSpace { partitions });
    }

    pub fn stamp(&self, index: usize, url: impl Into<String>, input: PathBuf, output: PathBuf) {
        self.send(EngineCommand::Stamp {
            index,
            url: url.into(),
            input,
            output,
        });
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            stamp_warn!("Engine thread is gone; command dropped");
        }
    }
}

async fn handle_command(context: &EngineContext, command: EngineCommand) {
    match command {
        EngineCommand::TestServer { url, digest } => {
            let result = context.timestamper.test_connectivity(&url, &digest).await;
            let _ = context.event_tx.send(EngineEvent::ServerTested(result));
        }
        EngineCommand::Crawl {
            job_id,
            input,
            extensions,
        } => {
            let job = DiskCrawlJob::new(
                job_id,
                input,
                extensions,
                context.registry.clone(),
                context.partitions.clone(),
            );
            let sink = ChannelCrawlSink::new(context.event_tx.clone());
            let joined = tokio::task::spawn_blocking(move || job.run(&sink)).await;
            if let Err(err) = joined {
                stamp_warn!("Crawl job {} panicked: {}", job_id, err);
                let _ = context.event_tx.send(EngineEvent::Fatal(format!(
                    "File search aborted unexpectedly: {err}"
                )));
            }
        }
        EngineCommand::QueryFreeSpace { partitions } => {
            let probe = context.probe.clone();
            let event = match tokio::task::spawn_blocking(move || probe.available(&partitions))
                .await
            {
                Ok(available) => EngineEvent::FreeSpace(available),
                Err(err) => {
                    stamp_warn!("Free space query panicked: {}", err);
                    EngineEvent::Fatal(format!("Free disk space check failed: {err}"))
                }
            };
            let _ = context.event_tx.send(event);
        }
        EngineCommand::Stamp {
            index,
            url,
            input,
            output,
        } => {
            let result = context.timestamper.stamp_file(&url, &input, &output).await;
            let _ = context
                .event_tx
                .send(EngineEvent::FileStamped { index, result });
        }
    }
}
