use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::Context;
use batchstamp_core::{update, BatchReport, BatchSession, Disposition, Effect, JobRegistry, Msg};
use batchstamp_engine::{AtomicFileWriter, EngineEvents, EngineHandle};
use stamp_logging::{stamp_debug, stamp_info, stamp_warn};

use crate::cli::Invocation;
use crate::config::AppConfig;
use crate::effects::EffectRunner;
use crate::prompt::{Prompter, TerminalPrompter};
use crate::ui::ProgressDisplay;

pub const EXIT_DONE: u8 = 0;
pub const EXIT_FAILED: u8 = 1;

/// Runs one batch to completion with the real engine and terminal prompts.
pub fn run_batch(invocation: &Invocation, config: &AppConfig) -> anyhow::Result<BatchReport> {
    let registry = Arc::new(JobRegistry::new());
    let (engine, events) = EngineHandle::new(config.engine_config(), registry.clone())
        .context("failed to start timestamping engine")?;
    let mut app = App::new(
        engine,
        events,
        registry,
        invocation.batch_log_dir.clone(),
        TerminalPrompter::new(invocation.assume_yes),
    );
    spawn_cancel_listener(app.sender());
    app.run(Msg::Start {
        options: invocation.options.clone(),
        input: invocation.input.clone(),
    })
}

/// Control loop: the only place the batch session is updated.
pub struct App<P: Prompter> {
    session: BatchSession,
    runner: EffectRunner,
    msg_tx: mpsc::Sender<Msg>,
    msg_rx: mpsc::Receiver<Msg>,
    display: ProgressDisplay,
    prompter: P,
}

impl<P: Prompter> App<P> {
    pub fn new(
        engine: EngineHandle,
        events: EngineEvents,
        registry: Arc<JobRegistry>,
        log_dir: PathBuf,
        prompter: P,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel();
        let runner = EffectRunner::new(engine, events, msg_tx.clone(), log_dir);
        Self {
            session: BatchSession::new(registry),
            runner,
            msg_tx,
            msg_rx,
            display: ProgressDisplay::new(),
            prompter,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<Msg> {
        self.msg_tx.clone()
    }

    pub fn run(&mut self, start: Msg) -> anyhow::Result<BatchReport> {
        let mut next = Some(start);
        loop {
            let msg = match next.take() {
                Some(msg) => msg,
                None => self.msg_rx.recv().context("message queue closed")?,
            };
            if let Some(report) = self.dispatch(msg) {
                return Ok(report);
            }
        }
    }

    fn dispatch(&mut self, msg: Msg) -> Option<BatchReport> {
        let session = std::mem::take(&mut self.session);
        let (mut session, effects) = update(session, msg);
        let view = session.view();
        if session.consume_dirty() {
            self.display.render(&view);
        }
        self.session = session;

        let mut finished = None;
        for effect in self.runner.enqueue(effects) {
            match effect {
                Effect::ConfirmLowSpace { warning } => {
                    let proceed = self
                        .display
                        .suspend(|| self.prompter.confirm_low_space(&warning));
                    let answer = if proceed {
                        Msg::LowSpaceProceed
                    } else {
                        Msg::LowSpaceAbort
                    };
                    let _ = self.msg_tx.send(answer);
                }
                Effect::PresentSelection { files } => {
                    let chosen = self.display.suspend(|| self.prompter.select_files(&files));
                    let answer = match chosen {
                        Some(paths) => Msg::SelectionConfirmed(paths),
                        None => Msg::SelectionRejected,
                    };
                    let _ = self.msg_tx.send(answer);
                }
                Effect::BatchFinished(report) => finished = Some(report),
                other => stamp_debug!("Effect not handled by the control loop: {:?}", other),
            }
        }
        finished
    }
}

/// Turns Ctrl-C into `Msg::Cancel` for the running batch.
fn spawn_cancel_listener(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                stamp_warn!("Ctrl-C handling unavailable: {}", err);
                return;
            }
        };
        runtime.block_on(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                stamp_info!("Interrupted, cancelling batch");
                if msg_tx.send(Msg::Cancel).is_err() {
                    break;
                }
            }
        });
    });
}

pub fn exit_status(report: &BatchReport) -> u8 {
    match report.disposition {
        Disposition::Completed => EXIT_DONE,
        _ => EXIT_FAILED,
    }
}

pub fn write_report_json(path: &Path, report: &BatchReport) -> anyhow::Result<PathBuf> {
    let content = serde_json::to_vec_pretty(report).context("failed to serialize report")?;
    let (writer, filename) = AtomicFileWriter::for_target(path)?;
    let written = writer
        .write(&filename, &content)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(written)
}
