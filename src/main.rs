//! Skyrim Compile Helper - command line entry point.
//!
//! `sch <solution> [configuration]` compiles one configuration of a saved solution and,
//! when every script compiled, deploys the build into Mod Organizer.
//!
//! # Execution Flow
//!
//! 1. Load `settings.yaml` from `SCH Data/` (with `SCH_*` environment overrides)
//! 2. Initialize logging → logs/sch.<date>
//! 3. Create a tokio runtime that runs the compiler processes
//! 4. Load the solution and build the [`CompileJob`](skyrim_compile_helper::CompileJob)
//!    for the requested (or selected) configuration
//! 5. Clean the output folders and run the [`CompileOrchestrator`]
//! 6. Deploy on success; exit with status 1 if any file failed
//!
//! `sch --pull-assets <solution>` instead copies the solution's Mod Organizer mod folder
//! back into its `src` folder and exits.
//!
//! Ctrl+C cancels the run: running compilers are killed and unclaimed files are
//! reported as not attempted.

use anyhow::{Context, Result, bail};
use skyrim_compile_helper::logging::{TracingLogSink, setup_logging_with_console};
use skyrim_compile_helper::services::{PapyrusCompiler, deploy};
use skyrim_compile_helper::{APP_NAME, CompileOrchestrator, ConfigManager, VERSION};
use std::process::ExitCode;
use std::sync::Arc;

const CONFIG_DIR: &str = "SCH Data";

fn main() -> Result<ExitCode> {
    let mut args = std::env::args().skip(1).peekable();
    let pull_assets = args.next_if(|arg| arg == "--pull-assets").is_some();
    let Some(solution_name) = args.next() else {
        eprintln!("Usage: sch <solution> [configuration]");
        eprintln!("       sch --pull-assets <solution>");
        return Ok(ExitCode::from(2));
    };
    let configuration = args.next();

    let config_manager = ConfigManager::new(CONFIG_DIR)?;
    let settings = config_manager.load_settings()?;

    let _log_guard = setup_logging_with_console("logs", "sch", settings.debug_mode, true)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let solution = config_manager
        .load_solution(&solution_name)
        .with_context(|| format!("Unknown solution {}", solution_name))?;

    if pull_assets {
        deploy::pull_assets(&solution, &settings)?;
        return Ok(ExitCode::SUCCESS);
    }

    if !settings.is_skyrim_configured() {
        bail!("SkyrimPath is not set in {}/settings.yaml", CONFIG_DIR);
    }

    let configuration = match configuration {
        Some(name) => name,
        None => solution.selected()?.name.clone(),
    };
    let job = solution.compile_job(&configuration, &settings)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("sch-io")
        .build()?;

    let orchestrator = Arc::new(CompileOrchestrator::new(
        Arc::new(PapyrusCompiler::new(runtime.handle().clone())),
        Arc::new(TracingLogSink),
    ));

    {
        let orchestrator = orchestrator.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - cancelling compilation...");
                orchestrator.request_cancel();
            }
        });
    }

    if settings.is_mod_organizer_configured() {
        deploy::clean_output_folders(&solution, &configuration, &settings)?;
    } else {
        std::fs::create_dir_all(&job.output_folder)
            .with_context(|| format!("Failed to create {}", job.output_folder))?;
    }

    tracing::info!(
        "Compiling {} ({}) from {}",
        solution.name,
        configuration,
        job.target
    );
    let report = orchestrator.run(&job)?;

    let exit_code = if report.failed > 0 || report.cancelled {
        tracing::error!("Compilation failed: {}", report.summary());
        ExitCode::FAILURE
    } else {
        if settings.is_mod_organizer_configured() {
            deploy::deploy_build(&solution, &configuration, &settings)?;
        } else {
            tracing::warn!("ModOrganizerPath is not set, skipping deployment");
        }
        ExitCode::SUCCESS
    };

    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    tracing::info!("Done");

    Ok(exit_code)
}
