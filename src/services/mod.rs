//! Services module - the pieces a compile run is made of.
//!
//! # Components
//!
//! - [`compiler`]: Builds the Papyrus compiler command line and runs one compiler process,
//!   streaming its stdout/stderr line by line. [`PapyrusCompiler`] is the real
//!   implementation of the [`CompilerInvoker`] seam.
//! - [`diagnostics`]: Parses `file(line,column): message` error lines.
//! - [`discovery`]: Finds the `.psc` files of a compile-all folder.
//! - [`deploy`]: Cleans output folders, copies finished builds into Mod Organizer and
//!   pulls mod assets back into the solution.
//!
//! None of these know about worker threads; the orchestrator composes them.

pub mod compiler;
pub mod deploy;
pub mod diagnostics;
pub mod discovery;

pub use compiler::{
    CancelReceiver, CompileError, CompileRequest, CompilerArguments, CompilerInvoker,
    CompilerOutput, InvocationSummary, PapyrusCompiler,
};
pub use diagnostics::DiagnosticParser;
