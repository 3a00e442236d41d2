use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use matcall_config::{ConfigLoader, LogLevel, MatcallConfig};
use once_cell::sync::Lazy;
use tempfile::TempDir;

static ENV_GUARD: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const OVERRIDES: &[&str] = &[
    "MATCALL_CONFIG",
    "MATCALL_ENGINE_COMMAND",
    "MATCALL_ENGINE_ARGS",
    "MATLABPATH",
    "MATCALL_LOG_LEVEL",
    "MATCALL_DEBUG",
];

fn clear_overrides() {
    for name in OVERRIDES {
        env::remove_var(name);
    }
}

fn sample() -> MatcallConfig {
    let mut config = MatcallConfig::default();
    config.engine.command = "/opt/bridge/engine".into();
    config.engine.args = vec!["-nodisplay".into()];
    config.session.search_paths = vec![PathBuf::from("/work/lib")];
    config.session.recursive = true;
    config.logging.level = LogLevel::Info;
    config
}

#[test]
fn test_file_round_trip_in_every_format() {
    let temp_dir = TempDir::new().unwrap();
    for name in [".matcall.toml", ".matcall.yaml", ".matcall.json"] {
        let path = temp_dir.path().join(name);
        ConfigLoader::save_to_file(&sample(), &path).unwrap();
        let loaded = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(loaded, sample(), "{name}");
    }
}

#[test]
fn test_unknown_extension_is_sniffed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("matcall.conf");
    fs::write(&path, "engine:\n  command: yaml-engine\n").unwrap();
    let loaded = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(loaded.engine.command, "yaml-engine");

    fs::write(&path, "engine = [").unwrap();
    let err = ConfigLoader::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Could not parse config file"), "{err}");
}

#[test]
fn test_parse_errors_name_the_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();
    let err = ConfigLoader::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("broken.json"), "{err}");
}

#[test]
fn test_environment_overrides() {
    let _lock = ENV_GUARD.lock().unwrap();
    clear_overrides();

    let extra = TempDir::new().unwrap();
    let joined = env::join_paths([PathBuf::from("/work/lib"), extra.path().to_path_buf()]).unwrap();
    env::set_var("MATCALL_ENGINE_COMMAND", "custom-engine");
    env::set_var("MATCALL_ENGINE_ARGS", "--batch  --quiet");
    env::set_var("MATLABPATH", &joined);
    env::set_var("MATCALL_LOG_LEVEL", "Debug");
    env::set_var("MATCALL_DEBUG", "yes");

    let mut config = sample();
    let result = ConfigLoader::apply_environment_variables(&mut config);
    clear_overrides();
    result.unwrap();

    assert_eq!(config.engine.command, "custom-engine");
    assert_eq!(config.engine.args, vec!["--batch", "--quiet"]);
    assert_eq!(
        config.session.search_paths,
        vec![PathBuf::from("/work/lib"), extra.path().to_path_buf()]
    );
    assert_eq!(config.logging.level, LogLevel::Debug);
    assert!(config.logging.debug);
}

#[test]
fn test_invalid_log_level_is_rejected() {
    let _lock = ENV_GUARD.lock().unwrap();
    clear_overrides();
    env::set_var("MATCALL_LOG_LEVEL", "chatty");
    let result = ConfigLoader::apply_environment_variables(&mut MatcallConfig::default());
    clear_overrides();
    let err = result.unwrap_err();
    assert!(err.to_string().contains("MATCALL_LOG_LEVEL"), "{err}");
}

#[test]
fn test_explicit_file_wins() {
    let _lock = ENV_GUARD.lock().unwrap();
    clear_overrides();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    ConfigLoader::save_to_file(&sample(), &path).unwrap();

    let loaded = ConfigLoader::load_with(Some(&path)).unwrap();
    assert_eq!(loaded, sample());

    let missing = temp_dir.path().join("missing.toml");
    let err = ConfigLoader::load_with(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "{err}");
}

#[test]
fn test_config_env_comes_first_in_search_order() {
    let _lock = ENV_GUARD.lock().unwrap();
    clear_overrides();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("from-env.yaml");
    ConfigLoader::save_to_file(&sample(), &path).unwrap();

    env::set_var("MATCALL_CONFIG", &path);
    let candidates = ConfigLoader::find_config_files();
    let located = ConfigLoader::locate();
    let loaded = ConfigLoader::load();
    clear_overrides();

    assert_eq!(candidates.first(), Some(&path));
    assert_eq!(located, Some(path));
    assert_eq!(loaded.unwrap(), sample());
}
