use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings from `settings.yaml`
///
/// Holds the install locations the compiler and deployment steps need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "SkyrimPath", default)]
    pub skyrim_path: Utf8PathBuf,

    #[serde(rename = "ModOrganizerPath", default)]
    pub mod_organizer_path: Utf8PathBuf,

    /// Seconds before a single compiler process is killed. `0` disables the limit.
    #[serde(rename = "Compile Timeout", default)]
    pub compile_timeout: u64,

    #[serde(rename = "Max Workers", default)]
    pub max_workers: usize,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            skyrim_path: Utf8PathBuf::new(),
            mod_organizer_path: Utf8PathBuf::new(),
            compile_timeout: 0,
            max_workers: 0,
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.compile_timeout > 0).then(|| Duration::from_secs(self.compile_timeout))
    }

    pub fn is_skyrim_configured(&self) -> bool {
        !self.skyrim_path.as_str().is_empty()
    }

    pub fn is_mod_organizer_configured(&self) -> bool {
        !self.mod_organizer_path.as_str().is_empty()
    }

    /// `<ModOrganizerPath>/mods/<mod_name>`
    pub fn mod_folder(&self, mod_name: &str) -> Utf8PathBuf {
        self.mod_organizer_path.join("mods").join(mod_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.compile_timeout, 0);
        assert_eq!(settings.timeout(), None);
        assert!(!settings.is_skyrim_configured());
        assert!(!settings.is_mod_organizer_configured());
    }

    #[test]
    fn test_timeout_conversion() {
        let settings = Settings {
            compile_timeout: 120,
            ..Default::default()
        };
        assert_eq!(settings.timeout(), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_settings_yaml_keys() {
        let yaml = "SkyrimPath: C:/Games/Skyrim\nModOrganizerPath: C:/MO2\n";
        let settings: Settings = serde_yaml_ng::from_str(yaml).unwrap();

        assert_eq!(settings.skyrim_path, Utf8PathBuf::from("C:/Games/Skyrim"));
        assert_eq!(settings.mod_folder("MyMod"), Utf8PathBuf::from("C:/MO2/mods/MyMod"));
    }
}
