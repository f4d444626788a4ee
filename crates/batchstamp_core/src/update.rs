use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stamp_logging::{stamp_debug, stamp_info, stamp_warn};

use crate::preflight::{find_shortfalls, shortfall_warning};
use crate::state::InFlight;
use crate::{
    output_path_for, BatchSession, BatchState, CandidateFile, CrawlEvent, Effect, InputSpec, Msg,
    StampOptions, StopReason,
};

/// Digest sent with the connectivity test request.
pub const TEST_DIGEST: [u8; 32] = [0; 32];

/// Pure update function: applies a message to the batch and returns any effects.
pub fn update(mut session: BatchSession, msg: Msg) -> (BatchSession, Vec<Effect>) {
    let effects = match msg {
        Msg::Start { options, input } => start(&mut session, options, input),
        Msg::Cancel => cancel(&mut session),
        Msg::LogOpened { path } => {
            if session.state.is_running() {
                session.result.set_log_path(path);
                session.mark_dirty();
            }
            Vec::new()
        }
        Msg::LogOpenFailed { error } => {
            if session.state.is_running() {
                stamp_warn!("Batch log unavailable, continuing without it: {}", error);
                session
                    .result
                    .set_log_warning(format!("Could not open batch log: {error}"));
                session.mark_dirty();
            }
            Vec::new()
        }
        Msg::ServerTested(outcome) => server_tested(&mut session, outcome),
        Msg::Crawl(event) => crawl_event(&mut session, event),
        Msg::FreeSpace(available) => free_space_reported(&mut session, &available),
        Msg::LowSpaceProceed => {
            if session.state == BatchState::PreflightCheck
                && session.pending_space_warning.take().is_some()
            {
                stamp_info!("Continuing despite low disk space");
                after_preflight(&mut session)
            } else {
                Vec::new()
            }
        }
        Msg::LowSpaceAbort => match session.pending_space_warning.take() {
            Some(warning) if session.state == BatchState::PreflightCheck => {
                finish_cancelled(&mut session, Some(warning))
            }
            _ => Vec::new(),
        },
        Msg::SelectionConfirmed(paths) => {
            if session.state == BatchState::AwaitingUserFileSelection {
                session.candidates.retain_selected(&paths);
                begin_converting(&mut session)
            } else {
                Vec::new()
            }
        }
        Msg::SelectionRejected => {
            if session.state == BatchState::AwaitingUserFileSelection {
                finish_cancelled(&mut session, None)
            } else {
                Vec::new()
            }
        }
        Msg::FileStamped { index, result } => file_stamped(&mut session, index, result),
        Msg::Fatal(error) => {
            if session.state.is_running() {
                finish_failed(&mut session, error)
            } else {
                Vec::new()
            }
        }
    };

    session.refresh_progress();
    (session, effects)
}

fn start(session: &mut BatchSession, options: StampOptions, input: InputSpec) -> Vec<Effect> {
    if session.state.is_running() {
        stamp_warn!("Start ignored, batch already in state {:?}", session.state);
        return Vec::new();
    }

    session.begin_batch(options, input);
    stamp_info!(
        "Batch started: job {:?}, time server {}",
        session.job_id,
        session.options.time_server_url
    );

    if let Err(reason) = validate(&session.options, &session.input) {
        return finish_failed(session, reason);
    }

    vec![
        Effect::OpenLog,
        Effect::TestServer {
            url: session.options.time_server_url.clone(),
            digest: TEST_DIGEST,
        },
    ]
}

fn validate(options: &StampOptions, input: &InputSpec) -> Result<(), String> {
    let url = url::Url::parse(options.time_server_url.trim())
        .map_err(|err| format!("Invalid time server url '{}': {err}", options.time_server_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "Unsupported time server url scheme '{}'",
            url.scheme()
        ));
    }
    if input.is_empty() {
        return Err("No input file or directory given".to_string());
    }
    if options.in_extensions.is_empty() {
        return Err("No input file extensions selected".to_string());
    }
    if !options.is_valid_out_extension() {
        return Err(format!(
            "Illegal output file extension '{}'",
            options.out_extension
        ));
    }
    Ok(())
}

fn cancel(session: &mut BatchSession) -> Vec<Effect> {
    session.registry.cancel();
    if !session.state.is_running() {
        return Vec::new();
    }
    stamp_info!("Batch cancelled by user in state {:?}", session.state);
    finish_cancelled(session, None)
}

fn server_tested(session: &mut BatchSession, outcome: Result<(), String>) -> Vec<Effect> {
    if session.state != BatchState::TestingServer {
        return Vec::new();
    }
    if let Err(err) = outcome {
        return finish_failed(
            session,
            format!("Test request to time server failed.\n{err}"),
        );
    }
    if session.registry.is_cancelled() {
        return finish_cancelled(session, None);
    }
    let Some(job_id) = session.job_id else {
        return finish_failed(session, "No crawl job allocated".to_string());
    };

    session.transition(BatchState::SearchingFiles);
    vec![Effect::SpawnCrawl {
        job_id,
        input: session.input.clone(),
        extensions: session.options.in_extensions.clone(),
    }]
}

fn crawl_event(session: &mut BatchSession, event: CrawlEvent) -> Vec<Effect> {
    let job_id = event.job_id();
    if session.state != BatchState::SearchingFiles || session.job_id != Some(job_id) {
        stamp_debug!("Dropping crawl event for inactive job {}", job_id);
        return Vec::new();
    }

    match session.registry.stop_reason(job_id) {
        Some(StopReason::Cancelled) => {
            return match event {
                CrawlEvent::Done { .. } => finish_cancelled(session, None),
                _ => Vec::new(),
            };
        }
        Some(StopReason::Superseded) => {
            stamp_debug!("Dropping crawl event for superseded job {}", job_id);
            return Vec::new();
        }
        None => {}
    }

    match event {
        CrawlEvent::ProcessingPath { path, progress, .. } => {
            session.search_fraction = session.search_fraction.max(progress.clamp(0.0, 1.0));
            session.current_path = Some(path);
            session.mark_dirty();
            Vec::new()
        }
        CrawlEvent::ExcludingPath { path, .. } => {
            stamp_debug!("Excluding {}", path.display());
            session.excluded += 1;
            Vec::new()
        }
        CrawlEvent::FoundFile {
            path,
            partition,
            size,
            ..
        } => {
            let line = format!("Found {}", path.display());
            let inserted = session.candidates.insert(CandidateFile {
                path,
                partition,
                size,
            });
            if !inserted {
                return Vec::new();
            }
            session.result.record_found(session.candidates.len());
            session.mark_dirty();
            vec![Effect::AppendLog(line)]
        }
        CrawlEvent::Done { stopped, .. } => {
            if let Some(reason) = stopped {
                stamp_debug!("Crawl job {} reported early stop: {:?}", job_id, reason);
            }
            enter_preflight(session)
        }
    }
}

fn enter_preflight(session: &mut BatchSession) -> Vec<Effect> {
    session.search_fraction = 1.0;
    session.current_path = None;
    session.transition(BatchState::PreflightCheck);
    stamp_info!("Search finished, {} files found", session.candidates.len());

    if session.candidates.is_empty() {
        return begin_converting(session);
    }
    let needed = session.candidates.bytes_per_partition();
    if needed.is_empty() {
        return after_preflight(session);
    }
    vec![Effect::QueryFreeSpace {
        partitions: needed.into_keys().collect(),
    }]
}

fn free_space_reported(
    session: &mut BatchSession,
    available: &BTreeMap<PathBuf, u64>,
) -> Vec<Effect> {
    if session.state != BatchState::PreflightCheck || session.pending_space_warning.is_some() {
        return Vec::new();
    }
    if session.registry.is_cancelled() {
        return finish_cancelled(session, None);
    }

    let shortfalls = find_shortfalls(&session.candidates.bytes_per_partition(), available);
    if shortfalls.is_empty() {
        return after_preflight(session);
    }

    let warning = shortfall_warning(&shortfalls);
    stamp_warn!("{}", warning);
    session.pending_space_warning = Some(warning.clone());
    session.mark_dirty();
    vec![Effect::ConfirmLowSpace { warning }]
}

fn after_preflight(session: &mut BatchSession) -> Vec<Effect> {
    if session.options.preview && !session.candidates.is_empty() {
        session.transition(BatchState::AwaitingUserFileSelection);
        return vec![Effect::PresentSelection {
            files: session.candidates.to_vec(),
        }];
    }
    begin_converting(session)
}

fn begin_converting(session: &mut BatchSession) -> Vec<Effect> {
    session.transition(BatchState::Converting);
    session.result.record_selected(session.candidates.len());
    stamp_next(session, 0)
}

fn stamp_next(session: &mut BatchSession, index: usize) -> Vec<Effect> {
    let total = session.candidates.len();
    let Some(file) = session.candidates.get(index) else {
        return finish_completed(session);
    };
    if session.registry.is_cancelled() {
        return finish_cancelled(session, None);
    }

    let input = file.path.clone();
    let output = output_for(session, &input);
    session.in_flight = Some(InFlight {
        index,
        input: input.clone(),
        output: output.clone(),
    });
    vec![Effect::StampFile {
        index,
        total,
        url: session.options.time_server_url.clone(),
        input,
        output,
    }]
}

fn output_for(session: &BatchSession, input: &Path) -> PathBuf {
    match (&session.input.file, &session.options.file_out) {
        (Some(single), Some(out)) if single.as_path() == input => out.clone(),
        _ => output_path_for(
            input,
            &session.options.in_extensions,
            &session.options.out_extension,
        ),
    }
}

fn file_stamped(
    session: &mut BatchSession,
    index: usize,
    result: Result<(), String>,
) -> Vec<Effect> {
    if session.state != BatchState::Converting {
        return Vec::new();
    }
    let Some(in_flight) = session.in_flight.take_if(|f| f.index == index) else {
        stamp_debug!("Dropping stale completion for file #{}", index);
        return Vec::new();
    };
    if session.registry.is_cancelled() {
        return finish_cancelled(session, None);
    }

    let total = session.candidates.len();
    let line = match &result {
        Ok(()) => format!(
            "[{}/{}] DONE {} -> {}",
            index + 1,
            total,
            in_flight.input.display(),
            in_flight.output.display()
        ),
        Err(err) => format!(
            "[{}/{}] FAILED {} -> {} : {}",
            index + 1,
            total,
            in_flight.input.display(),
            in_flight.output.display(),
            err
        ),
    };
    if let Err(err) = &result {
        stamp_warn!("Timestamping {} failed: {}", in_flight.input.display(), err);
    }
    session.result.record_file(result.as_ref().map(|_| ()).map_err(String::as_str));
    session.mark_dirty();

    let mut effects = vec![Effect::AppendLog(line)];
    effects.extend(stamp_next(session, index + 1));
    effects
}

fn finish_completed(session: &mut BatchSession) -> Vec<Effect> {
    session.transition(BatchState::Done);
    session.result.finish_completed();
    let mut effects = Vec::new();
    if session.candidates.is_empty() {
        effects.push(Effect::AppendLog("No matching files found".to_string()));
    }
    stamp_info!("Batch finished: {:?}", session.result.snapshot());
    effects.extend(finish_effects(session));
    effects
}

fn finish_cancelled(session: &mut BatchSession, reason: Option<String>) -> Vec<Effect> {
    session.transition(BatchState::Cancelled);
    session.result.finish_cancelled(reason);
    finish_effects(session)
}

fn finish_failed(session: &mut BatchSession, error: String) -> Vec<Effect> {
    stamp_warn!("Batch failed: {}", error);
    session.transition(BatchState::Failed);
    session.result.finish_failed(error);
    finish_effects(session)
}

fn finish_effects(session: &mut BatchSession) -> Vec<Effect> {
    session.in_flight = None;
    session.pending_space_warning = None;
    session.mark_dirty();
    vec![
        Effect::CloseLog,
        Effect::BatchFinished(session.result.snapshot()),
    ]
}
