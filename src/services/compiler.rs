use crate::models::{AssemblyMode, CompileJob};
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Receiving end of a run's cancellation signal. `true` means stop.
pub type CancelReceiver = watch::Receiver<bool>;

/// Errors raised while preparing or running one compiler process
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("The flags passed to the compiler must not be empty")]
    FlagsInvalid,

    #[error("The compile target has to be specified")]
    TargetMissing,

    #[error("The output folder has to be specified")]
    OutputMissing,

    #[error("Failed to launch compiler {path}: {source}")]
    ProcessLaunch {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Compiler timed out after {0:?}")]
    Timeout(Duration),

    #[error("Compilation cancelled")]
    Cancelled,

    #[error("Process error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    /// Missing flags, target or output. These abort a run before any process starts.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            CompileError::FlagsInvalid | CompileError::TargetMissing | CompileError::OutputMissing
        )
    }
}

/// One line of compiler output, tagged with the stream it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerOutput<'a> {
    Stdout(&'a str),
    Stderr(&'a str),
}

/// Completion signal of one compiler process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvocationSummary {
    /// Non-empty lines seen on stderr.
    pub error_count: usize,

    /// Recorded for logging only. Success is decided by `error_count`.
    pub exit_code: Option<i32>,
}

impl InvocationSummary {
    pub fn is_successful(&self) -> bool {
        self.error_count == 0
    }
}

/// Everything one compiler process needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileRequest {
    pub executable: Utf8PathBuf,
    pub default_source_folder: Utf8PathBuf,
    pub target: Utf8PathBuf,
    pub flags: String,
    pub import_folders: Vec<Utf8PathBuf>,
    pub output_folder: Utf8PathBuf,
    pub all: bool,
    pub debug: bool,
    pub optimize: bool,
    pub quiet: bool,
    pub assembly_mode: AssemblyMode,
    pub timeout: Option<Duration>,
}

impl CompileRequest {
    /// Request compiling `target` with the options of `job`.
    ///
    /// `all` is taken from the job only when `target` is the job's own target;
    /// per-file requests of a fanned-out run never pass `-all`.
    pub fn for_target(job: &CompileJob, target: &Utf8Path) -> Self {
        Self {
            executable: job.compiler_executable(),
            default_source_folder: job.default_source_folder(),
            target: target.to_path_buf(),
            flags: job.flags.clone(),
            import_folders: job.import_folders.clone(),
            output_folder: job.output_folder.clone(),
            all: job.all && target == job.target.as_path(),
            debug: job.debug,
            optimize: job.optimize,
            quiet: job.quiet,
            assembly_mode: job.assembly_mode,
            timeout: job.timeout,
        }
    }

    pub fn with_import_folder(mut self, folder: &Utf8Path) -> Self {
        if !self.import_folders.iter().any(|f| f.as_path() == folder) {
            self.import_folders.push(folder.to_path_buf());
        }
        self
    }

    /// Check the preconditions that must hold before a process is spawned.
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.flags.trim().is_empty() {
            return Err(CompileError::FlagsInvalid);
        }
        if self.target.as_str().trim().is_empty() {
            return Err(CompileError::TargetMissing);
        }
        self.validate_output()
    }

    /// Like [`validate`](Self::validate), without the target check.
    pub fn validate_options(&self) -> Result<(), CompileError> {
        if self.flags.trim().is_empty() {
            return Err(CompileError::FlagsInvalid);
        }
        self.validate_output()
    }

    fn validate_output(&self) -> Result<(), CompileError> {
        if self.output_folder.as_str().trim().is_empty() {
            return Err(CompileError::OutputMissing);
        }
        Ok(())
    }

    pub fn arguments(&self) -> CompilerArguments {
        let mut switches = Vec::new();
        if self.all {
            switches.push("-all");
        }
        if self.debug {
            switches.push("-debug");
        }
        if self.optimize {
            switches.push("-optimize");
        }
        if self.quiet {
            switches.push("-quiet");
        }
        if let Some(flag) = self.assembly_mode.flag() {
            switches.push(flag);
        }

        let import_path = std::iter::once(self.default_source_folder.as_str())
            .chain(self.import_folders.iter().map(|folder| folder.as_str()))
            .collect::<Vec<_>>()
            .join(";");

        CompilerArguments {
            target: self.target.to_string(),
            switches,
            import_path,
            flags: self.flags.clone(),
            output: self.output_folder.to_string(),
        }
    }
}

/// The argument list handed to `PapyrusCompiler.exe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerArguments {
    pub target: String,
    pub switches: Vec<&'static str>,
    pub import_path: String,
    pub flags: String,
    pub output: String,
}

impl CompilerArguments {
    /// The raw command line, in the exact shape the Windows compiler expects.
    pub fn command_line(&self) -> String {
        self.to_string()
    }

    /// The same arguments as separate argv entries.
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.switches.len() + 4);
        args.push(self.target.clone());
        args.extend(self.switches.iter().map(|s| s.to_string()));
        args.push(format!("-import={}", self.import_path));
        args.push(format!("-flags={}", self.flags));
        args.push(format!("-output={}", self.output));
        args
    }
}

impl fmt::Display for CompilerArguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.target)?;
        for switch in &self.switches {
            write!(f, " {}", switch)?;
        }
        write!(
            f,
            " -import=\"{}\" -flags= \"{}\" -output=\"{}\"",
            self.import_path, self.flags, self.output
        )
    }
}

/// Runs one compiler invocation to completion.
///
/// Implementations block the calling thread until the process exits and report
/// every output line through `on_output` in the order it was read.
pub trait CompilerInvoker: Send + Sync {
    fn invoke(
        &self,
        request: &CompileRequest,
        cancel: &CancelReceiver,
        on_output: &mut dyn FnMut(CompilerOutput<'_>),
    ) -> Result<InvocationSummary, CompileError>;
}

/// Launches the real `PapyrusCompiler.exe`.
///
/// Process I/O runs on a tokio runtime; [`CompilerInvoker::invoke`] drives it with
/// `Handle::block_on`, so it must be called from a plain thread, not from inside
/// the runtime.
#[derive(Debug, Clone)]
pub struct PapyrusCompiler {
    runtime: Handle,
}

enum Completion {
    Exited(std::io::Result<(usize, ExitStatus)>),
    TimedOut(Duration),
    Cancelled,
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

impl PapyrusCompiler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    fn build_command(request: &CompileRequest) -> Command {
        let arguments = request.arguments();
        let mut command = std::process::Command::new(request.executable.as_std_path());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            command.raw_arg(arguments.command_line());
            command.creation_flags(CREATE_NO_WINDOW);
        }
        #[cfg(not(windows))]
        {
            command.args(arguments.args());
        }

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut command = Command::from(command);
        command.kill_on_drop(true);
        command
    }

    async fn run(
        &self,
        request: &CompileRequest,
        mut cancel: CancelReceiver,
        on_output: &mut dyn FnMut(CompilerOutput<'_>),
    ) -> Result<InvocationSummary, CompileError> {
        tracing::debug!(
            "Executing: {} {}",
            request.executable,
            request.arguments().command_line()
        );

        let mut child = Self::build_command(request).spawn().map_err(|source| {
            CompileError::ProcessLaunch {
                path: request.executable.clone(),
                source,
            }
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("compiler stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("compiler stderr was not captured"))?;

        let completion = {
            let pump = Self::pump(
                &mut child,
                BufReader::new(stdout).lines(),
                BufReader::new(stderr).lines(),
                on_output,
            );
            let deadline = async {
                match request.timeout {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending().await,
                }
            };
            let cancelled = async {
                // A dropped sender can never cancel
                if cancel.wait_for(|stop| *stop).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };

            tokio::select! {
                result = pump => Completion::Exited(result),
                _ = deadline => Completion::TimedOut(request.timeout.unwrap_or_default()),
                _ = cancelled => Completion::Cancelled,
            }
        };

        match completion {
            Completion::Exited(result) => {
                let (error_count, status) = result?;
                tracing::debug!(
                    "Compiler exited with {:?} after {} error lines",
                    status.code(),
                    error_count
                );
                Ok(InvocationSummary {
                    error_count,
                    exit_code: status.code(),
                })
            }
            Completion::TimedOut(limit) => {
                tracing::warn!("Compiler timed out after {:?}, killing it", limit);
                Self::kill(&mut child).await;
                Err(CompileError::Timeout(limit))
            }
            Completion::Cancelled => {
                tracing::warn!("Compilation cancelled, killing compiler");
                Self::kill(&mut child).await;
                Err(CompileError::Cancelled)
            }
        }
    }

    /// Forward both streams line by line until they close, then reap the child.
    async fn pump(
        child: &mut Child,
        mut stdout: Lines<BufReader<ChildStdout>>,
        mut stderr: Lines<BufReader<ChildStderr>>,
        on_output: &mut dyn FnMut(CompilerOutput<'_>),
    ) -> std::io::Result<(usize, ExitStatus)> {
        let mut error_count = 0;
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line? {
                    Some(line) if !line.trim().is_empty() => on_output(CompilerOutput::Stdout(&line)),
                    Some(_) => {}
                    None => stdout_open = false,
                },
                line = stderr.next_line(), if stderr_open => match line? {
                    Some(line) if !line.trim().is_empty() => {
                        error_count += 1;
                        on_output(CompilerOutput::Stderr(&line));
                    }
                    Some(_) => {}
                    None => stderr_open = false,
                },
            }
        }

        let status = child.wait().await?;
        Ok((error_count, status))
    }

    async fn kill(child: &mut Child) {
        if let Err(e) = child.kill().await {
            tracing::error!("Failed to kill compiler process: {}", e);
        }
    }
}

impl CompilerInvoker for PapyrusCompiler {
    fn invoke(
        &self,
        request: &CompileRequest,
        cancel: &CancelReceiver,
        on_output: &mut dyn FnMut(CompilerOutput<'_>),
    ) -> Result<InvocationSummary, CompileError> {
        request.validate()?;
        self.runtime
            .block_on(self.run(request, cancel.clone(), on_output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompileRequest {
        let job = CompileJob::builder("C:/Skyrim", "C:/Mods/Outfits/src/OutfitQuest.psc")
            .flags("TESV_Papyrus_Flags.flg")
            .import_folder("C:/SKSE/Source")
            .output_folder("C:/Mods/Outfits/bin/Debug/scripts")
            .build();
        CompileRequest::for_target(&job, &job.target)
    }

    #[test]
    fn test_command_line_shape() {
        let request = request();
        let command_line = request.arguments().command_line();

        assert_eq!(
            command_line,
            "\"C:/Mods/Outfits/src/OutfitQuest.psc\" \
             -import=\"C:/Skyrim/Data/Scripts/Source;C:/SKSE/Source\" \
             -flags= \"TESV_Papyrus_Flags.flg\" \
             -output=\"C:/Mods/Outfits/bin/Debug/scripts\""
        );
    }

    #[test]
    fn test_switch_order() {
        let mut request = request();
        request.all = true;
        request.debug = true;
        request.optimize = true;
        request.quiet = true;
        request.assembly_mode = AssemblyMode::NoAssembly;

        let arguments = request.arguments();
        assert_eq!(
            arguments.switches,
            vec!["-all", "-debug", "-optimize", "-quiet", "-noasm"]
        );
        assert!(arguments
            .command_line()
            .contains("\" -all -debug -optimize -quiet -noasm -import="));
    }

    #[test]
    fn test_default_assembly_mode_adds_no_switch() {
        let arguments = request().arguments();
        assert!(arguments.switches.is_empty());
    }

    #[test]
    fn test_argv_form() {
        let mut request = request();
        request.assembly_mode = AssemblyMode::AssembleAndKeep;

        let args = request.arguments().args();
        assert_eq!(args[0], "C:/Mods/Outfits/src/OutfitQuest.psc");
        assert_eq!(args[1], "-keepasm");
        assert_eq!(args[2], "-import=C:/Skyrim/Data/Scripts/Source;C:/SKSE/Source");
        assert_eq!(args[3], "-flags=TESV_Papyrus_Flags.flg");
        assert_eq!(args[4], "-output=C:/Mods/Outfits/bin/Debug/scripts");
    }

    #[test]
    fn test_per_file_request_never_passes_all() {
        let job = CompileJob::builder("C:/Skyrim", "C:/Mods/Outfits/src")
            .flags("TESV_Papyrus_Flags.flg")
            .output_folder("C:/out")
            .all(true)
            .build();

        let folder = CompileRequest::for_target(&job, &job.target);
        let file = CompileRequest::for_target(&job, Utf8Path::new("C:/Mods/Outfits/src/A.psc"));

        assert!(folder.all);
        assert!(!file.all);
    }

    #[test]
    fn test_with_import_folder_deduplicates() {
        let request = request()
            .with_import_folder(Utf8Path::new("C:/Mods/Outfits/src"))
            .with_import_folder(Utf8Path::new("C:/Mods/Outfits/src"));

        assert_eq!(
            request.import_folders,
            vec![
                Utf8PathBuf::from("C:/SKSE/Source"),
                Utf8PathBuf::from("C:/Mods/Outfits/src")
            ]
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut no_flags = request();
        no_flags.flags = "  ".to_string();
        assert!(matches!(no_flags.validate(), Err(CompileError::FlagsInvalid)));

        let mut no_target = request();
        no_target.target = Utf8PathBuf::new();
        assert!(matches!(no_target.validate(), Err(CompileError::TargetMissing)));
        assert!(no_target.validate_options().is_ok());

        let mut no_output = request();
        no_output.output_folder = Utf8PathBuf::new();
        assert!(matches!(no_output.validate(), Err(CompileError::OutputMissing)));
        assert!(matches!(no_output.validate_options(), Err(CompileError::OutputMissing)));

        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_configuration_error_classification() {
        assert!(CompileError::FlagsInvalid.is_configuration_error());
        assert!(CompileError::OutputMissing.is_configuration_error());
        assert!(!CompileError::Cancelled.is_configuration_error());
        assert!(!CompileError::Timeout(Duration::from_secs(1)).is_configuration_error());
    }

    #[test]
    fn test_invalid_request_never_spawns() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let compiler = PapyrusCompiler::new(runtime.handle().clone());
        let (_tx, cancel) = watch::channel(false);

        let mut request = request();
        request.flags.clear();
        // The executable does not exist, so reaching spawn would yield ProcessLaunch
        let result = compiler.invoke(&request, &cancel, &mut |_| {});

        assert!(matches!(result, Err(CompileError::FlagsInvalid)));
    }

    #[test]
    fn test_missing_executable_is_launch_failure() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let compiler = PapyrusCompiler::new(runtime.handle().clone());
        let (_tx, cancel) = watch::channel(false);

        let mut request = request();
        request.executable = Utf8PathBuf::from("/definitely/not/here/PapyrusCompiler.exe");
        let result = compiler.invoke(&request, &cancel, &mut |_| {});

        assert!(matches!(result, Err(CompileError::ProcessLaunch { .. })));
    }

    #[test]
    fn test_summary_success_ignores_exit_code() {
        let summary = InvocationSummary {
            error_count: 0,
            exit_code: Some(1),
        };
        assert!(summary.is_successful());

        let summary = InvocationSummary {
            error_count: 2,
            exit_code: Some(0),
        };
        assert!(!summary.is_successful());
    }
}
