//! Data models for compile jobs, their results and the persisted configuration.
//!
//! - [`CompileJob`]: One compilation request: compiler location, target, flags, folders and switches
//! - [`CompilationReport`]: Aggregate result of a run, built from per-file [`CompilationOutcome`]s
//! - [`Settings`]: Install locations and limits loaded from `settings.yaml`
//! - [`Solution`]: A mod project with named [`CompileConfiguration`]s

pub mod job;
pub mod report;
pub mod settings;
pub mod solution;

pub use job::{AssemblyMode, CompileJob, CompileJobBuilder};
pub use report::{CompilationOutcome, CompilationReport, Diagnostic};
pub use settings::Settings;
pub use solution::{CompileConfiguration, Solution, SolutionError};
