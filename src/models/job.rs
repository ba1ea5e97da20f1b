use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the compiler does with intermediate assembly (`.pas`) files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AssemblyMode {
    /// Generate assembly, run the assembler, then delete the assembly files.
    #[default]
    AssembleAndDelete,

    /// Generate assembly and run the assembler, keeping the assembly files.
    AssembleAndKeep,

    /// Generate assembly files without running the assembler.
    GenerateOnly,

    /// Neither generate assembly nor assemble. Useful as a syntax-only dry run.
    NoAssembly,
}

impl AssemblyMode {
    /// The compiler switch for this mode. The default mode has none.
    pub fn flag(self) -> Option<&'static str> {
        match self {
            AssemblyMode::AssembleAndDelete => None,
            AssemblyMode::AssembleAndKeep => Some("-keepasm"),
            AssemblyMode::GenerateOnly => Some("-asmonly"),
            AssemblyMode::NoAssembly => Some("-noasm"),
        }
    }

    /// Whether a successful run leaves a compiled `.pex` behind.
    pub fn produces_binary(self) -> bool {
        matches!(
            self,
            AssemblyMode::AssembleAndDelete | AssemblyMode::AssembleAndKeep
        )
    }
}

/// Immutable description of one compilation run.
///
/// Built once by the caller (usually through [`CompileJob::builder`] or
/// [`Solution::compile_job`](crate::models::Solution::compile_job)) and only read while
/// the run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileJob {
    /// Skyrim install root. The compiler lives under `Papyrus Compiler/` and the
    /// vanilla sources under `Data/Scripts/Source`.
    pub compiler_root: Utf8PathBuf,

    /// A single script, or the folder to compile when `all` is set.
    pub target: Utf8PathBuf,

    /// Flags file name handed to `-flags=`.
    pub flags: String,

    /// Extra import folders, searched after the vanilla source folder.
    pub import_folders: Vec<Utf8PathBuf>,

    pub output_folder: Utf8PathBuf,

    pub debug: bool,
    pub quiet: bool,
    pub optimize: bool,

    /// Compile every script in `target` instead of a single file.
    pub all: bool,

    /// With `all`, hand the whole folder to one compiler process (`-all`) instead of
    /// fanning out one process per script.
    pub single_process: bool,

    pub assembly_mode: AssemblyMode,

    /// Fail files whose `.pex` is missing after an error-free run.
    pub check_artifacts: bool,

    /// Per-file limit. `None` waits for the compiler indefinitely.
    pub timeout: Option<Duration>,

    /// Upper bound on worker threads. `0` leaves only the processor-count cap.
    pub max_workers: usize,
}

impl CompileJob {
    pub fn builder(
        compiler_root: impl Into<Utf8PathBuf>,
        target: impl Into<Utf8PathBuf>,
    ) -> CompileJobBuilder {
        CompileJobBuilder::new(compiler_root.into(), target.into())
    }

    /// `<root>/Papyrus Compiler/PapyrusCompiler.exe`
    pub fn compiler_executable(&self) -> Utf8PathBuf {
        compiler_executable(&self.compiler_root)
    }

    /// `<root>/Data/Scripts/Source`, always the first import folder.
    pub fn default_source_folder(&self) -> Utf8PathBuf {
        default_source_folder(&self.compiler_root)
    }
}

pub fn compiler_executable(compiler_root: &Utf8Path) -> Utf8PathBuf {
    compiler_root
        .join("Papyrus Compiler")
        .join("PapyrusCompiler.exe")
}

pub fn default_source_folder(compiler_root: &Utf8Path) -> Utf8PathBuf {
    compiler_root.join("Data").join("Scripts").join("Source")
}

/// Builder for [`CompileJob`]. Everything except the root and target is optional.
#[derive(Debug, Clone)]
pub struct CompileJobBuilder {
    job: CompileJob,
}

impl CompileJobBuilder {
    fn new(compiler_root: Utf8PathBuf, target: Utf8PathBuf) -> Self {
        Self {
            job: CompileJob {
                compiler_root,
                target,
                flags: String::new(),
                import_folders: Vec::new(),
                output_folder: Utf8PathBuf::new(),
                debug: false,
                quiet: false,
                optimize: false,
                all: false,
                single_process: false,
                assembly_mode: AssemblyMode::default(),
                check_artifacts: false,
                timeout: None,
                max_workers: 0,
            },
        }
    }

    pub fn flags(mut self, flags: impl Into<String>) -> Self {
        self.job.flags = flags.into();
        self
    }

    pub fn import_folder(mut self, folder: impl Into<Utf8PathBuf>) -> Self {
        self.job.import_folders.push(folder.into());
        self
    }

    pub fn import_folders<I, P>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.job
            .import_folders
            .extend(folders.into_iter().map(Into::into));
        self
    }

    pub fn output_folder(mut self, folder: impl Into<Utf8PathBuf>) -> Self {
        self.job.output_folder = folder.into();
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.job.debug = enabled;
        self
    }

    pub fn quiet(mut self, enabled: bool) -> Self {
        self.job.quiet = enabled;
        self
    }

    pub fn optimize(mut self, enabled: bool) -> Self {
        self.job.optimize = enabled;
        self
    }

    pub fn all(mut self, enabled: bool) -> Self {
        self.job.all = enabled;
        self
    }

    pub fn single_process(mut self, enabled: bool) -> Self {
        self.job.single_process = enabled;
        self
    }

    pub fn assembly_mode(mut self, mode: AssemblyMode) -> Self {
        self.job.assembly_mode = mode;
        self
    }

    pub fn check_artifacts(mut self, enabled: bool) -> Self {
        self.job.check_artifacts = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job.timeout = timeout;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.job.max_workers = max_workers;
        self
    }

    pub fn build(self) -> CompileJob {
        self.job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_mode_flags() {
        assert_eq!(AssemblyMode::AssembleAndDelete.flag(), None);
        assert_eq!(AssemblyMode::AssembleAndKeep.flag(), Some("-keepasm"));
        assert_eq!(AssemblyMode::GenerateOnly.flag(), Some("-asmonly"));
        assert_eq!(AssemblyMode::NoAssembly.flag(), Some("-noasm"));
    }

    #[test]
    fn test_assembly_mode_binary_output() {
        assert!(AssemblyMode::AssembleAndDelete.produces_binary());
        assert!(AssemblyMode::AssembleAndKeep.produces_binary());
        assert!(!AssemblyMode::GenerateOnly.produces_binary());
        assert!(!AssemblyMode::NoAssembly.produces_binary());
    }

    #[test]
    fn test_builder_defaults() {
        let job = CompileJob::builder("C:/Skyrim", "C:/Mod/src/Foo.psc").build();

        assert_eq!(job.target, Utf8PathBuf::from("C:/Mod/src/Foo.psc"));
        assert!(job.flags.is_empty());
        assert!(!job.all);
        assert_eq!(job.assembly_mode, AssemblyMode::AssembleAndDelete);
        assert_eq!(job.timeout, None);
        assert_eq!(job.max_workers, 0);
    }

    #[test]
    fn test_compiler_paths() {
        let job = CompileJob::builder("C:/Skyrim", "Foo.psc").build();

        assert!(job
            .compiler_executable()
            .as_str()
            .ends_with("PapyrusCompiler.exe"));
        assert_eq!(
            job.default_source_folder(),
            Utf8PathBuf::from("C:/Skyrim/Data/Scripts/Source")
        );
    }
}
