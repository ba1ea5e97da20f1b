//! Integration tests for ConfigManager and configuration file handling
//!
//! These tests verify:
//! - Settings loading from hand-written YAML
//! - Solution persistence: list, load, save, delete, rename
//! - Building a compile job from a stored solution

use camino::Utf8PathBuf;
use skyrim_compile_helper::models::{AssemblyMode, CompileConfiguration};
use skyrim_compile_helper::{ConfigManager, Settings, Solution};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let nested = config_path.join("SCH Data");
    let manager = ConfigManager::new(&nested).unwrap();

    assert_eq!(manager.config_dir(), &nested);
    assert!(nested.is_dir());
}

#[test]
fn test_load_handwritten_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        config_path.join("settings.yaml"),
        r#"
SkyrimPath: "C:/Games/Skyrim Special Edition"
ModOrganizerPath: "C:/Modding/MO2"
Compile Timeout: 45
"#,
    )
    .unwrap();

    let settings = manager
        .load_settings_with(config::Environment::with_prefix("SCH").source(Some(Default::default())))
        .unwrap();

    assert_eq!(settings.skyrim_path, "C:/Games/Skyrim Special Edition");
    assert_eq!(settings.mod_organizer_path, "C:/Modding/MO2");
    assert_eq!(settings.timeout(), Some(Duration::from_secs(45)));
    assert_eq!(settings.max_workers, 0);
    assert!(!settings.debug_mode);
}

#[test]
fn test_invalid_settings_yaml() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(config_path.join("settings.yaml"), "Compile Timeout: [not a number").unwrap();

    assert!(manager.load_settings().is_err());
}

#[test]
fn test_solution_lifecycle() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut solution = Solution::new("Outfits", "C:/Mods/Outfits");
    let mut release = CompileConfiguration::new("Release");
    release.optimize = true;
    release.assembly_option = AssemblyMode::NoAssembly;
    release.import_folders = vec!["C:/SKSE/Source".into()];
    solution.upsert_configuration(release);
    manager.save_solution(&solution).unwrap();
    manager.save_solution(&Solution::new("Armory", "C:/Mods/Armory")).unwrap();

    assert_eq!(manager.list_solutions().unwrap(), vec!["Armory", "Outfits"]);

    let loaded = manager.load_solution("Outfits").unwrap();
    assert_eq!(loaded, solution);
    let release = loaded.configuration("Release").unwrap();
    assert_eq!(release.assembly_option, AssemblyMode::NoAssembly);

    manager.delete_solution("Armory").unwrap();
    assert_eq!(manager.list_solutions().unwrap(), vec!["Outfits"]);
    assert!(manager.load_solution("Armory").is_err());
}

#[test]
fn test_rename_solution() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut solution = Solution::new("Outfits", "C:/Mods/Outfits");
    manager.save_solution(&solution).unwrap();
    manager.save_solution(&Solution::new("Armory", "C:/Mods/Armory")).unwrap();

    solution.name = "Armory".to_string();
    assert!(manager.rename_solution("Outfits", &solution).is_err());

    solution.name = "Outfits Redux".to_string();
    manager.rename_solution("Outfits", &solution).unwrap();

    assert_eq!(manager.list_solutions().unwrap(), vec!["Armory", "Outfits Redux"]);
    assert_eq!(manager.load_solution("Outfits Redux").unwrap().path, "C:/Mods/Outfits");
}

#[test]
fn test_ignores_foreign_files() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();
    manager.save_solution(&Solution::new("Outfits", "C:/Mods/Outfits")).unwrap();

    fs::write(manager.solutions_dir().join("notes.txt"), "hello").unwrap();

    assert_eq!(manager.list_solutions().unwrap(), vec!["Outfits"]);
}

#[test]
fn test_compile_job_from_stored_solution() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let settings = Settings {
        skyrim_path: "C:/Skyrim".into(),
        compile_timeout: 30,
        max_workers: 3,
        ..Default::default()
    };
    manager.save_settings(&settings).unwrap();
    manager.save_solution(&Solution::new("Outfits", "C:/Mods/Outfits")).unwrap();

    let solution = manager.load_solution("Outfits").unwrap();
    let job = solution.compile_job("Debug", &settings).unwrap();

    assert_eq!(job.target, "C:/Mods/Outfits/src");
    assert_eq!(job.output_folder, "C:/Mods/Outfits/bin/Debug/scripts");
    assert_eq!(job.compiler_executable(), "C:/Skyrim/Papyrus Compiler/PapyrusCompiler.exe");
    assert_eq!(job.flags, "TESV_Papyrus_Flags.flg");
    assert_eq!(job.timeout, Some(Duration::from_secs(30)));
    assert_eq!(job.max_workers, 3);
    assert!(job.debug);
    assert!(job.all);
}
