use crate::models::{Settings, Solution};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use ::config::{Config, Environment};
use std::fs;

/// Prefix of environment variables that override `settings.yaml`, e.g. `SCH_SKYRIMPATH`.
pub const ENV_PREFIX: &str = "SCH";

const SETTINGS_FILE: &str = "settings.yaml";
const SOLUTIONS_DIR: &str = "Solutions";
const SOLUTION_EXTENSION: &str = "yaml";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages:
/// - Settings (`settings.yaml`): Skyrim and Mod Organizer paths, compile limits
/// - Solutions (`Solutions/<name>.yaml`): one file per solution
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    solutions_dir: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "SCH Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join(SETTINGS_FILE),
            solutions_dir: config_dir.join(SOLUTIONS_DIR),
            config_dir,
        })
    }

    /// Load settings, applying `SCH_*` environment overrides.
    pub fn load_settings(&self) -> Result<Settings> {
        self.load_settings_with(Environment::with_prefix(ENV_PREFIX))
    }

    /// Load settings, applying overrides from `environment`.
    ///
    /// Recognized keys (after the prefix): `SKYRIMPATH`, `MODORGANIZERPATH`,
    /// `COMPILE_TIMEOUT`, `MAX_WORKERS`, `DEBUG_MODE`.
    pub fn load_settings_with(&self, environment: Environment) -> Result<Settings> {
        let mut settings = if self.settings_path.exists() {
            let file_contents = fs::read_to_string(&self.settings_path)
                .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;
            let settings: Settings = serde_yaml_ng::from_str(&file_contents)
                .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;
            tracing::info!("Loaded settings from {}", self.settings_path);
            settings
        } else {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            Settings::default()
        };

        let overrides = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()
            .context("Failed to read environment overrides")?;
        apply_overrides(&mut settings, &overrides)?;

        Ok(settings)
    }

    /// Save settings to `settings.yaml`.
    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Names of all saved solutions, sorted.
    pub fn list_solutions(&self) -> Result<Vec<String>> {
        if !self.solutions_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in self
            .solutions_dir
            .read_dir_utf8()
            .with_context(|| format!("Failed to read solutions folder: {}", self.solutions_dir))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension() == Some(SOLUTION_EXTENSION)
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_solution(&self, name: &str) -> Result<Solution> {
        let path = self.solution_path(name)?;
        let file_contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read solution: {}", path))?;
        let solution: Solution = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse solution: {}", path))?;

        tracing::debug!("Loaded solution {} from {}", solution.name, path);
        Ok(solution)
    }

    pub fn save_solution(&self, solution: &Solution) -> Result<()> {
        let path = self.solution_path(&solution.name)?;
        fs::create_dir_all(&self.solutions_dir).with_context(|| {
            format!("Failed to create solutions folder: {}", self.solutions_dir)
        })?;

        let yaml_string = serde_yaml_ng::to_string(solution)
            .with_context(|| format!("Failed to serialize solution {}", solution.name))?;
        fs::write(&path, yaml_string)
            .with_context(|| format!("Failed to write solution: {}", path))?;

        tracing::info!("Saved solution {} to {}", solution.name, path);
        Ok(())
    }

    /// Delete a saved solution. Deleting one that does not exist is not an error.
    pub fn delete_solution(&self, name: &str) -> Result<()> {
        let path = self.solution_path(name)?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete solution: {}", path))?;
            tracing::info!("Deleted solution {}", name);
        }
        Ok(())
    }

    /// Save `solution` under its (new) name and remove the file stored as `old_name`.
    pub fn rename_solution(&self, old_name: &str, solution: &Solution) -> Result<()> {
        if old_name != solution.name && self.solution_path(&solution.name)?.exists() {
            bail!("A solution named {} already exists", solution.name);
        }

        self.save_solution(solution)?;
        if old_name != solution.name {
            self.delete_solution(old_name)?;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn solutions_dir(&self) -> &Utf8Path {
        &self.solutions_dir
    }

    fn solution_path(&self, name: &str) -> Result<Utf8PathBuf> {
        let name = name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            bail!("Invalid solution name: {:?}", name);
        }
        Ok(self
            .solutions_dir
            .join(format!("{}.{}", name, SOLUTION_EXTENSION)))
    }
}

fn apply_overrides(settings: &mut Settings, overrides: &Config) -> Result<()> {
    if let Ok(path) = overrides.get_string("skyrimpath") {
        settings.skyrim_path = Utf8PathBuf::from(path);
    }
    if let Ok(path) = overrides.get_string("modorganizerpath") {
        settings.mod_organizer_path = Utf8PathBuf::from(path);
    }
    if let Ok(seconds) = overrides.get_int("compile_timeout") {
        settings.compile_timeout = u64::try_from(seconds)
            .with_context(|| format!("Invalid compile timeout override: {}", seconds))?;
    }
    if let Ok(workers) = overrides.get_int("max_workers") {
        settings.max_workers = usize::try_from(workers)
            .with_context(|| format!("Invalid max workers override: {}", workers))?;
    }
    if let Ok(debug) = overrides.get_bool("debug_mode") {
        settings.debug_mode = debug;
    }
    Ok(())
}
