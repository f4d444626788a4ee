use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use batchstamp_core::{Effect, Msg};
use batchstamp_engine::{BatchLog, EngineEvent, EngineEvents, EngineHandle};
use chrono::Local;
use stamp_logging::{stamp_debug, stamp_info, stamp_warn};

/// Executes effects that touch IO (engine commands, the batch log) and
/// forwards engine events into the message queue.
pub struct EffectRunner {
    engine: EngineHandle,
    msg_tx: mpsc::Sender<Msg>,
    log_dir: PathBuf,
    log: Option<BatchLog>,
}

impl EffectRunner {
    pub fn new(
        engine: EngineHandle,
        events: EngineEvents,
        msg_tx: mpsc::Sender<Msg>,
        log_dir: PathBuf,
    ) -> Self {
        spawn_event_loop(events, msg_tx.clone());
        Self {
            engine,
            msg_tx,
            log_dir,
            log: None,
        }
    }

    /// Runs what it can and hands back the effects that need the user.
    pub fn enqueue(&mut self, effects: Vec<Effect>) -> Vec<Effect> {
        let mut interactive = Vec::new();
        for effect in effects {
            match effect {
                Effect::OpenLog => self.open_log(),
                Effect::AppendLog(line) => self.append_log(&line),
                Effect::CloseLog => self.close_log(),
                Effect::TestServer { url, digest } => {
                    stamp_info!("Testing time server {}", url);
                    self.engine.test_server(url, digest);
                }
                Effect::SpawnCrawl {
                    job_id,
                    input,
                    extensions,
                } => {
                    stamp_debug!("SpawnCrawl job_id={} extensions={:?}", job_id, extensions);
                    self.engine.spawn_crawl(job_id, input, extensions);
                }
                Effect::QueryFreeSpace { partitions } => {
                    self.engine.query_free_space(partitions);
                }
                Effect::StampFile {
                    index,
                    total,
                    url,
                    input,
                    output,
                } => {
                    stamp_info!("[{}/{}] Stamping {}", index + 1, total, input.display());
                    self.engine.stamp(index, url, input, output);
                }
                Effect::ConfirmLowSpace { .. }
                | Effect::PresentSelection { .. }
                | Effect::BatchFinished(_) => interactive.push(effect),
            }
        }
        interactive
    }

    fn open_log(&mut self) {
        self.close_log();
        let msg = match BatchLog::open(&self.log_dir, Local::now()) {
            Ok(log) => {
                let path = log.path().to_path_buf();
                stamp_info!("Batch log at {:?}", path);
                self.log = Some(log);
                Msg::LogOpened { path }
            }
            Err(err) => Msg::LogOpenFailed {
                error: err.to_string(),
            },
        };
        let _ = self.msg_tx.send(msg);
    }

    fn append_log(&mut self, line: &str) {
        if let Some(log) = self.log.as_mut() {
            if let Err(err) = log.append(line) {
                stamp_warn!("Failed to write batch log {:?}: {}", log.path(), err);
            }
        }
    }

    fn close_log(&mut self) {
        if let Some(log) = self.log.take() {
            if let Err(err) = log.close() {
                stamp_warn!("Failed to close batch log: {}", err);
            }
        }
    }
}

fn spawn_event_loop(events: EngineEvents, msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        while let Some(event) = events.recv() {
            if msg_tx.send(map_event(event)).is_err() {
                break;
            }
        }
    });
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ServerTested(result) => {
            Msg::ServerTested(result.map_err(|err| err.to_string()))
        }
        EngineEvent::Crawl(event) => Msg::Crawl(event),
        EngineEvent::FreeSpace(available) => Msg::FreeSpace(available),
        EngineEvent::FileStamped { index, result } => Msg::FileStamped {
            index,
            result: match result {
                Ok(outcome) => {
                    stamp_debug!(
                        "File #{} stamped: {:?} ({} bytes)",
                        index,
                        outcome.output,
                        outcome.reply_bytes
                    );
                    Ok(())
                }
                Err(err) => Err(err.to_string()),
            },
        },
        EngineEvent::Fatal(error) => Msg::Fatal(error),
    }
}
