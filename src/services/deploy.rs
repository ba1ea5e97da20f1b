use crate::models::{Settings, Solution};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Recreate the build folder of `configuration` and the solution's Mod Organizer mod folder, both empty.
pub fn clean_output_folders(
    solution: &Solution,
    configuration: &str,
    settings: &Settings,
) -> Result<()> {
    let mod_folder = mod_folder(solution, settings)?;
    recreate_dir(&mod_folder)?;
    recreate_dir(&solution.build_folder(configuration))?;

    tracing::info!(
        "Cleaned output folders of {} ({})",
        solution.name,
        configuration
    );
    Ok(())
}

/// Copy a finished build into Mod Organizer.
///
/// With `copy_source_files` set on the configuration, `src/scripts` is first copied to
/// `bin/<configuration>/scripts/source`. Then the whole build folder is copied into
/// `<ModOrganizerPath>/mods/<solution>`, overwriting existing files.
///
/// Returns the number of files written to the mod folder.
pub fn deploy_build(solution: &Solution, configuration: &str, settings: &Settings) -> Result<usize> {
    let config = solution.configuration(configuration)?;
    let mod_folder = mod_folder(solution, settings)?;
    let build_folder = solution.build_folder(&config.name);

    if config.copy_source_files {
        let sources = solution.source_folder().join("scripts");
        if sources.is_dir() {
            let destination = solution.output_folder(&config.name).join("source");
            let copied = copy_dir_recursive(&sources, &destination)?;
            tracing::debug!("Copied {} source files into the build", copied);
        } else {
            tracing::warn!("Source scripts folder {} does not exist, skipping", sources);
        }
    }

    if !build_folder.is_dir() {
        bail!("Build folder {} does not exist", build_folder);
    }

    let copied = copy_dir_recursive(&build_folder, &mod_folder)?;
    tracing::info!("Deployed {} files to {}", copied, mod_folder);
    Ok(copied)
}

/// Copy the solution's Mod Organizer mod folder back into `<solution>/src`.
///
/// Assets edited in the game (meshes, textures, plugins) end up in the mod folder;
/// this brings them into the repository. Existing files are overwritten.
pub fn pull_assets(solution: &Solution, settings: &Settings) -> Result<usize> {
    let mod_folder = mod_folder(solution, settings)?;
    if !mod_folder.is_dir() {
        bail!("Mod folder {} does not exist", mod_folder);
    }

    let destination = solution.source_folder();
    let copied = copy_dir_recursive(&mod_folder, &destination)?;
    tracing::info!("Copied {} files from {} to {}", copied, mod_folder, destination);
    Ok(copied)
}

fn mod_folder(solution: &Solution, settings: &Settings) -> Result<Utf8PathBuf> {
    if !settings.is_mod_organizer_configured() {
        bail!("The Mod Organizer path is not configured");
    }
    Ok(settings.mod_folder(&solution.name))
}

fn recreate_dir(dir: &Utf8Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("Failed to remove folder: {}", dir))?;
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create folder: {}", dir))
}

fn copy_dir_recursive(from: &Utf8Path, to: &Utf8Path) -> Result<usize> {
    fs::create_dir_all(to).with_context(|| format!("Failed to create folder: {}", to))?;

    let mut copied = 0;
    for entry in from
        .read_dir_utf8()
        .with_context(|| format!("Failed to read folder: {}", from))?
    {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir_recursive(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {} to {}", entry.path(), target))?;
            copied += 1;
        }
    }
    Ok(copied)
}
