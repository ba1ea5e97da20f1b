use crate::models::job::{AssemblyMode, CompileJob};
use crate::models::settings::Settings;
use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named set of compiler options, such as "Debug" or "Release".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileConfiguration {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "FlagFile", default = "default_flag_file")]
    pub flag_file: String,

    #[serde(rename = "All", default = "default_true")]
    pub all: bool,

    #[serde(rename = "Quiet", default)]
    pub quiet: bool,

    #[serde(rename = "Debug", default)]
    pub debug: bool,

    #[serde(rename = "Optimize", default)]
    pub optimize: bool,

    #[serde(rename = "AssemblyOption", default)]
    pub assembly_option: AssemblyMode,

    #[serde(rename = "ImportFolders", default)]
    pub import_folders: Vec<Utf8PathBuf>,

    #[serde(rename = "CopySourceFiles", default)]
    pub copy_source_files: bool,
}

impl CompileConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flag_file: default_flag_file(),
            all: true,
            quiet: false,
            debug: false,
            optimize: false,
            assembly_option: AssemblyMode::default(),
            import_folders: Vec::new(),
            copy_source_files: false,
        }
    }
}

fn default_flag_file() -> String {
    "TESV_Papyrus_Flags.flg".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SolutionError {
    #[error("Solution {solution} has no configuration named {configuration}")]
    UnknownConfiguration {
        solution: String,
        configuration: String,
    },

    #[error("Solution {0} has no configuration selected")]
    NoConfigurationSelected(String),

    #[error("Skyrim path is not configured")]
    SkyrimPathNotConfigured,
}

/// A mod project: a source tree plus its build configurations.
///
/// Sources are expected under `<path>/src`, builds land in `<path>/bin/<configuration>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Path")]
    pub path: Utf8PathBuf,

    #[serde(rename = "SelectedConfiguration", default)]
    pub selected_configuration: String,

    #[serde(rename = "CompileConfigurations", default)]
    pub configurations: Vec<CompileConfiguration>,
}

impl Solution {
    /// A solution with the usual Debug and Release configurations.
    pub fn new(name: impl Into<String>, path: impl Into<Utf8PathBuf>) -> Self {
        let mut debug = CompileConfiguration::new("Debug");
        debug.debug = true;

        let mut release = CompileConfiguration::new("Release");
        release.optimize = true;

        Self {
            name: name.into(),
            path: path.into(),
            selected_configuration: debug.name.clone(),
            configurations: vec![debug, release],
        }
    }

    /// Configurations keyed by name, in declaration order.
    pub fn configurations_by_name(&self) -> IndexMap<&str, &CompileConfiguration> {
        self.configurations
            .iter()
            .map(|c| (c.name.as_str(), c))
            .collect()
    }

    pub fn configuration(&self, name: &str) -> Result<&CompileConfiguration, SolutionError> {
        self.configurations_by_name()
            .get(name)
            .copied()
            .ok_or_else(|| SolutionError::UnknownConfiguration {
                solution: self.name.clone(),
                configuration: name.to_string(),
            })
    }

    pub fn selected(&self) -> Result<&CompileConfiguration, SolutionError> {
        if self.selected_configuration.is_empty() {
            return Err(SolutionError::NoConfigurationSelected(self.name.clone()));
        }
        self.configuration(&self.selected_configuration)
    }

    /// Insert or replace a configuration by name, keeping its position if it existed.
    pub fn upsert_configuration(&mut self, configuration: CompileConfiguration) {
        match self
            .configurations
            .iter_mut()
            .find(|c| c.name == configuration.name)
        {
            Some(existing) => *existing = configuration,
            None => self.configurations.push(configuration),
        }
    }

    pub fn source_folder(&self) -> Utf8PathBuf {
        self.path.join("src")
    }

    pub fn build_folder(&self, configuration: &str) -> Utf8PathBuf {
        self.path.join("bin").join(configuration)
    }

    pub fn output_folder(&self, configuration: &str) -> Utf8PathBuf {
        self.build_folder(configuration).join("scripts")
    }

    /// Build the job that compiles `configuration` of this solution.
    pub fn compile_job(
        &self,
        configuration: &str,
        settings: &Settings,
    ) -> Result<CompileJob, SolutionError> {
        if !settings.is_skyrim_configured() {
            return Err(SolutionError::SkyrimPathNotConfigured);
        }

        let config = self.configuration(configuration)?;

        Ok(CompileJob::builder(settings.skyrim_path.clone(), self.source_folder())
            .flags(config.flag_file.clone())
            .import_folders(config.import_folders.iter().cloned())
            .output_folder(self.output_folder(&config.name))
            .all(config.all)
            .quiet(config.quiet)
            .debug(config.debug)
            .optimize(config.optimize)
            .assembly_mode(config.assembly_option)
            .check_artifacts(true)
            .timeout(settings.timeout())
            .max_workers(settings.max_workers)
            .build())
    }
}
