//! Parallel batch compilation.
//!
//! [`CompileOrchestrator::run`] resolves the files of a [`CompileJob`], fans them out
//! over a fixed pool of scoped worker threads and folds every per-file result into a
//! [`CompilationReport`].
//!
//! # Components
//!
//! - [`WorkQueue`]: the shared claim cursor. Workers `fetch_add` it to take the next
//!   file and stop once it runs past the end.
//! - [`ResultAggregator`]: atomic success/failure counters plus a mutex-guarded
//!   outcome list.
//! - [`CompilerInvoker`]: one blocking compiler run per claimed file.
//!
//! # Failure semantics
//!
//! Missing flags, target or output folder abort the run with a [`CompileError`]
//! before any worker starts. A missing or empty compile-all folder logs one warning
//! and yields an empty report. Everything that goes wrong for a single file is
//! recorded against that file and never stops the other workers; a compiler that
//! cannot be launched also ends the worker that tried to launch it.
//!
//! # Worker pool
//!
//! The pool has `min(files, processors + 1)` threads, spawned once per run inside
//! `std::thread::scope` and joined before the report is built. Without a job timeout
//! a hung compiler blocks its worker, and therefore the run, until it exits.

pub mod aggregator;
pub mod dispatcher;

pub use aggregator::{AggregateSnapshot, ResultAggregator};
pub use dispatcher::{WorkQueue, available_processors, worker_count};

use crate::events::{CompileEvent, EventBroadcaster, RunPhase};
use crate::logging::{CATEGORY_GENERAL, LogEntry, LogSink, Severity, event_ids};
use crate::models::{CompilationOutcome, CompilationReport, CompileJob, Diagnostic};
use crate::services::compiler::{
    CancelReceiver, CompileError, CompileRequest, CompilerInvoker, CompilerOutput,
    InvocationSummary,
};
use crate::services::diagnostics::DiagnosticParser;
use crate::services::discovery;
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::watch;

/// How the resolved files are handed to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    /// One compiler process per file, spread over the worker pool.
    PerFile,
    /// One `-all` compiler process for the whole folder.
    SingleProcess,
}

/// Drives one compilation run at a time.
pub struct CompileOrchestrator {
    invoker: Arc<dyn CompilerInvoker>,
    sink: Arc<dyn LogSink>,
    events: EventBroadcaster,
    parser: DiagnosticParser,
    processors: usize,
    cancel_tx: watch::Sender<bool>,
    phase: RwLock<RunPhase>,
}

impl CompileOrchestrator {
    pub fn new(invoker: Arc<dyn CompilerInvoker>, sink: Arc<dyn LogSink>) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            invoker,
            sink,
            events: EventBroadcaster::default(),
            parser: DiagnosticParser::new(),
            processors: available_processors(),
            cancel_tx,
            phase: RwLock::new(RunPhase::Idle),
        }
    }

    pub fn with_events(mut self, events: EventBroadcaster) -> Self {
        self.events = events;
        self
    }

    /// Size the pool as if the machine had `processors` cores.
    pub fn with_processor_count(mut self, processors: usize) -> Self {
        self.processors = processors.max(1);
        self
    }

    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    pub fn phase(&self) -> RunPhase {
        *self
            .phase
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ask the running job to stop.
    ///
    /// Workers stop claiming files and running compilers are killed. The flag is
    /// cleared when the next run starts.
    pub fn request_cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel_tx.send_replace(true);
    }

    /// Worker count this orchestrator would use for `files` files of `job`.
    pub fn planned_workers(&self, job: &CompileJob, files: usize) -> usize {
        worker_count(files, self.processors, job.max_workers)
    }

    /// Resolve the files of `job` and compile them.
    pub fn run(&self, job: &CompileJob) -> Result<CompilationReport, CompileError> {
        self.begin_run();
        self.check_preconditions(CompileRequest::for_target(job, &job.target).validate())?;

        let Some((files, mode)) = self.resolve_files(job) else {
            self.set_phase(RunPhase::Aborted);
            return Ok(CompilationReport::empty());
        };

        Ok(self.dispatch(job, &files, mode))
    }

    /// Compile an explicit list of files with the options of `job`.
    ///
    /// `job.target` and `job.all` are ignored; every file gets its own process.
    pub fn run_files(
        &self,
        job: &CompileJob,
        files: &[Utf8PathBuf],
    ) -> Result<CompilationReport, CompileError> {
        self.begin_run();
        self.check_preconditions(
            CompileRequest::for_target(job, &job.target).validate_options(),
        )?;
        Ok(self.dispatch(job, files, DispatchMode::PerFile))
    }

    fn begin_run(&self) {
        self.cancel_tx.send_replace(false);
        self.set_phase(RunPhase::ResolvingFiles);
    }

    fn set_phase(&self, phase: RunPhase) {
        tracing::debug!("Compile run phase: {:?}", phase);
        *self
            .phase
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
    }

    fn check_preconditions(
        &self,
        validation: Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        validation.inspect_err(|e| {
            tracing::error!("Compile job rejected: {}", e);
            self.set_phase(RunPhase::Aborted);
        })
    }

    fn resolve_files(&self, job: &CompileJob) -> Option<(Vec<Utf8PathBuf>, DispatchMode)> {
        if !job.all {
            return Some((vec![job.target.clone()], DispatchMode::PerFile));
        }

        let message = match discovery::find_scripts(&job.target) {
            Ok(Some(files)) if !files.is_empty() => {
                let mode = if job.single_process {
                    DispatchMode::SingleProcess
                } else {
                    DispatchMode::PerFile
                };
                return Some((files, mode));
            }
            Ok(Some(_)) => format!("The folder {} contains no script files.", job.target),
            Ok(None) => format!("The folder {} does not exist.", job.target),
            Err(e) => format!("The folder {} could not be read: {:#}", job.target, e),
        };

        self.sink.write(
            LogEntry::new(event_ids::TARGET_NOT_FOUND, "Target Folder Not Found", message)
                .with_severity(Severity::Warning)
                .with_categories(&[CATEGORY_GENERAL]),
        );
        None
    }

    fn dispatch(
        &self,
        job: &CompileJob,
        files: &[Utf8PathBuf],
        mode: DispatchMode,
    ) -> CompilationReport {
        let started = Instant::now();
        let workers = match mode {
            DispatchMode::PerFile => self.planned_workers(job, files.len()),
            DispatchMode::SingleProcess => 1,
        };

        if !job.quiet && !files.is_empty() {
            self.sink.write(LogEntry::new(
                event_ids::RUN_STARTED,
                "Starting Compilation",
                format!(
                    "Starting compilation for {} files using {} workers...",
                    files.len(),
                    workers
                ),
            ));
        }
        self.events.send(CompileEvent::RunStarted {
            total: files.len(),
            workers,
        });

        let aggregator = ResultAggregator::new();
        self.set_phase(RunPhase::Dispatching);

        match mode {
            DispatchMode::PerFile => self.run_pool(job, files, workers, &aggregator),
            DispatchMode::SingleProcess => self.run_single_process(job, files, &aggregator),
        }

        self.set_phase(RunPhase::Reporting);
        let report = self.build_report(files.len(), workers, &aggregator, started);
        self.log_summary(job, &report);
        self.events.send(CompileEvent::RunFinished {
            succeeded: report.succeeded,
            failed: report.failed,
            not_attempted: report.not_attempted,
        });
        self.set_phase(RunPhase::Done);

        report
    }

    fn run_pool(
        &self,
        job: &CompileJob,
        files: &[Utf8PathBuf],
        workers: usize,
        aggregator: &ResultAggregator,
    ) {
        let queue = WorkQueue::new(files);

        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers);
            for worker in 0..workers {
                let queue = &queue;
                let spawned = std::thread::Builder::new()
                    .name(format!("sch-worker-{}", worker))
                    .spawn_scoped(scope, move || self.worker_loop(job, queue, aggregator));

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => tracing::error!("Failed to spawn compile worker {}: {}", worker, e),
                }
            }

            self.set_phase(RunPhase::Joining);
            for handle in handles {
                if handle.join().is_err() {
                    tracing::error!("A compile worker panicked");
                }
            }
        });
    }

    fn worker_loop(
        &self,
        job: &CompileJob,
        queue: &WorkQueue<'_, Utf8PathBuf>,
        aggregator: &ResultAggregator,
    ) {
        let cancel = self.cancel_tx.subscribe();

        loop {
            if *cancel.borrow() {
                tracing::debug!("Worker stopping: run cancelled");
                break;
            }
            let Some((index, file)) = queue.claim() else {
                break;
            };

            match self.compile_file(job, index, file, &cancel, aggregator) {
                None => {}
                Some(CompileError::Cancelled) => {
                    tracing::info!("Worker stopped: compilation of {} was cancelled", file);
                    break;
                }
                Some(e) => {
                    self.sink.write(
                        LogEntry::new(
                            event_ids::WORKER_FAILURE,
                            "Compile Worker Stopped",
                            format!("Worker stopped after {}: {}", file, e),
                        )
                        .with_severity(Severity::Error)
                        .as_error(),
                    );
                    break;
                }
            }
        }
    }

    /// Compile one claimed file and record its outcome.
    ///
    /// Returns the error when it should end the calling worker.
    fn compile_file(
        &self,
        job: &CompileJob,
        index: usize,
        file: &Utf8Path,
        cancel: &CancelReceiver,
        aggregator: &ResultAggregator,
    ) -> Option<CompileError> {
        let started = Instant::now();
        let name = file.to_string();

        if !job.quiet {
            self.sink.write(LogEntry::new(
                event_ids::FILE_STARTED,
                "Compiling File",
                format!("Compiling \"{}\"...", file.file_stem().unwrap_or(file.as_str())),
            ));
        }
        self.events.send(CompileEvent::FileStarted { file: name.clone() });

        let mut request = CompileRequest::for_target(job, file);
        if let Some(parent) = file.parent().filter(|p| !p.as_str().is_empty()) {
            request = request.with_import_folder(parent);
        }

        let (result, mut diagnostics) = self.invoke(&request, cancel);

        let fatal = match result {
            Ok(summary) if summary.is_successful() => {
                if job.check_artifacts
                    && job.assembly_mode.produces_binary()
                    && !Self::artifact_exists(job, file)
                {
                    diagnostics.push(Diagnostic::message(format!(
                        "No output generated for {}, compilation failed.",
                        file
                    )));
                }
                None
            }
            Ok(summary) => {
                tracing::debug!("{} produced {} error lines", file, summary.error_count);
                diagnostics.extend(Self::unreported_errors(&summary, diagnostics.len()));
                None
            }
            Err(e) => {
                diagnostics.push(Diagnostic::message(e.to_string()));
                matches!(e, CompileError::ProcessLaunch { .. } | CompileError::Cancelled).then_some(e)
            }
        };

        let outcome = if diagnostics.is_empty() {
            CompilationOutcome::succeeded(name, started.elapsed())
        } else {
            CompilationOutcome::failed(name, diagnostics, started.elapsed())
        };
        self.record(job, index, outcome, aggregator);

        fatal
    }

    /// Run the compiler once, forwarding its output to the sink.
    ///
    /// Returns the invocation result along with one diagnostic per error line.
    fn invoke(
        &self,
        request: &CompileRequest,
        cancel: &CancelReceiver,
    ) -> (Result<InvocationSummary, CompileError>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();

        let result = self.invoker.invoke(request, cancel, &mut |output| match output {
            CompilerOutput::Stdout(line) => {
                self.sink.write(LogEntry::new(
                    event_ids::COMPILER_OUTPUT,
                    "Compilation Message",
                    line,
                ));
            }
            CompilerOutput::Stderr(line) => {
                let diagnostic = self.parser.parse(line);
                let entry = if diagnostic.file.is_some() {
                    LogEntry::new(
                        event_ids::COMPILER_DIAGNOSTIC,
                        "File Contained Errors",
                        diagnostic.to_string(),
                    )
                } else {
                    LogEntry::new(event_ids::COMPILER_ERROR_OUTPUT, "Compilation Error", line)
                };
                self.sink.write(entry.with_severity(Severity::Error).as_error());
                diagnostics.push(diagnostic);
            }
        });

        (result, diagnostics)
    }

    fn record(
        &self,
        job: &CompileJob,
        index: usize,
        outcome: CompilationOutcome,
        aggregator: &ResultAggregator,
    ) {
        if outcome.success {
            if !job.quiet {
                self.sink.write(LogEntry::new(
                    event_ids::FILE_SUCCEEDED,
                    "Finished Compiling File",
                    format!("Compilation of file {} succeeded", outcome.file),
                ));
            }
        } else {
            self.sink.write(
                LogEntry::new(
                    event_ids::FILE_FAILED,
                    "Failed file compilation",
                    format!(
                        "Compilation of {} failed with {} errors.",
                        outcome.file,
                        outcome.diagnostics.len()
                    ),
                )
                .with_severity(Severity::Warning)
                .as_error(),
            );
        }

        self.events.send(CompileEvent::FileFinished {
            file: outcome.file.clone(),
            success: outcome.success,
        });

        if outcome.success {
            aggregator.record_success(index, outcome);
        } else {
            aggregator.record_failure(index, outcome);
        }
    }

    /// Compile the whole folder with one `-all` process and attribute errors per file.
    fn run_single_process(
        &self,
        job: &CompileJob,
        files: &[Utf8PathBuf],
        aggregator: &ResultAggregator,
    ) {
        let started = Instant::now();
        let cancel = self.cancel_tx.subscribe();
        self.set_phase(RunPhase::Joining);

        let request = CompileRequest::for_target(job, &job.target);
        let (result, mut diagnostics) = self.invoke(&request, &cancel);

        let batch_error = match result {
            Ok(summary) => {
                diagnostics.extend(Self::unreported_errors(&summary, diagnostics.len()));
                None
            }
            Err(e) => Some(Diagnostic::message(e.to_string())),
        };

        let (attributed, unattributed): (Vec<_>, Vec<_>) = diagnostics
            .into_iter()
            .partition(|d| files.iter().any(|f| DiagnosticParser::refers_to(d, f)));

        for (index, file) in files.iter().enumerate() {
            let mut file_diagnostics: Vec<Diagnostic> = attributed
                .iter()
                .filter(|d| DiagnosticParser::refers_to(d, file))
                .cloned()
                .collect();
            file_diagnostics.extend(unattributed.iter().cloned());
            file_diagnostics.extend(batch_error.iter().cloned());

            if file_diagnostics.is_empty()
                && job.check_artifacts
                && job.assembly_mode.produces_binary()
                && !Self::artifact_exists(job, file)
            {
                file_diagnostics.push(Diagnostic::message(format!(
                    "No output generated for {}, compilation failed.",
                    file
                )));
            }

            let outcome = if file_diagnostics.is_empty() {
                CompilationOutcome::succeeded(file.to_string(), started.elapsed())
            } else {
                CompilationOutcome::failed(file.to_string(), file_diagnostics, started.elapsed())
            };
            self.record(job, index, outcome, aggregator);
        }
    }

    /// A diagnostic for error lines the invoker counted but never streamed.
    fn unreported_errors(summary: &InvocationSummary, streamed: usize) -> Option<Diagnostic> {
        (summary.error_count > streamed).then(|| {
            Diagnostic::message(format!(
                "{} error lines reported",
                summary.error_count - streamed
            ))
        })
    }

    fn artifact_exists(job: &CompileJob, file: &Utf8Path) -> bool {
        file.file_stem()
            .map(|stem| job.output_folder.join(format!("{}.pex", stem)).exists())
            .unwrap_or(false)
    }

    fn build_report(
        &self,
        total: usize,
        workers: usize,
        aggregator: &ResultAggregator,
        started: Instant,
    ) -> CompilationReport {
        let snapshot = aggregator.snapshot();
        let attempted = snapshot.succeeded + snapshot.failed;

        CompilationReport {
            total,
            succeeded: snapshot.succeeded,
            failed: snapshot.failed,
            not_attempted: total.saturating_sub(attempted),
            failed_files: snapshot.failed_files,
            outcomes: snapshot.outcomes,
            workers,
            cancelled: *self.cancel_tx.borrow(),
            duration: started.elapsed(),
        }
    }

    fn log_summary(&self, job: &CompileJob, report: &CompilationReport) {
        tracing::info!(
            "Compilation finished in {:.2}s: {}",
            report.duration.as_secs_f32(),
            report.summary()
        );

        if job.quiet || report.total == 0 {
            return;
        }

        let entry = LogEntry::new(
            event_ids::RUN_FINISHED,
            "Finished Compilation",
            format!(
                "Compilation of {} files has finished. {}.",
                report.total,
                report.summary()
            ),
        );
        let entry = if report.failed > 0 {
            entry.with_severity(Severity::Warning).as_error()
        } else {
            entry
        };
        self.sink.write(entry);

        for (i, file) in report.failed_files.iter().enumerate() {
            self.sink.write(
                LogEntry::new(
                    event_ids::FILE_FAILED,
                    format!("Failed File No. {}", i + 1),
                    format!("Failed on {}", file),
                )
                .with_severity(Severity::Warning)
                .as_error(),
            );
        }
    }
}
