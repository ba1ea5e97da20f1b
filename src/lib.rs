// Skyrim Compile Helper - parallel Papyrus compilation for mod solutions
//
// This is the library crate containing the compile orchestration and configuration.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod services;

// Re-export commonly used types for convenience
pub use crate::config::ConfigManager;
pub use events::{CompileEvent, EventBroadcaster, RunPhase};
pub use models::{CompilationReport, CompileJob, Settings, Solution};
pub use orchestrator::CompileOrchestrator;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
