//! Configuration file loading and validation.

use std::path::Path;

use strobe_sim::MAX_WIDTH;

use crate::error::ConfigError;
use crate::types::BenchConfig;

/// Name of the configuration file looked up in a bench directory.
pub const CONFIG_FILE_NAME: &str = "strobe.toml";

/// Loads and validates a bench configuration file.
pub fn load_config(path: &Path) -> Result<BenchConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content, Some(path))
}

/// Loads `<dir>/strobe.toml`, or the defaults if the file does not exist.
pub fn load_config_from_dir(dir: &Path) -> Result<BenchConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(BenchConfig::default());
    }
    load_config(&path)
}

/// Parses and validates a bench configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<BenchConfig, ConfigError> {
    parse(content, None)
}

fn parse(content: &str, path: Option<&Path>) -> Result<BenchConfig, ConfigError> {
    let config: BenchConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.map(Path::to_path_buf),
        message: e.message().to_string(),
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks that every value is usable by the kernel and the engines.
pub fn validate_config(config: &BenchConfig) -> Result<(), ConfigError> {
    if config.clock.period_fs() < 2 {
        return Err(ConfigError::invalid(
            "clock.period",
            format!(
                "must be at least 2 fs, got {} {}",
                config.clock.period, config.clock.unit
            ),
        ));
    }
    let width = config.handshake.data_width;
    if width == 0 || width > MAX_WIDTH {
        return Err(ConfigError::invalid(
            "handshake.data_width",
            format!("must be 1..={MAX_WIDTH}, got {width}"),
        ));
    }
    if config.sim.max_deltas == 0 {
        return Err(ConfigError::invalid("sim.max_deltas", "must be at least 1"));
    }
    if config.watchdog.as_ref().is_some_and(|w| w.delay == 0) {
        return Err(ConfigError::invalid("watchdog.delay", "must be greater than 0"));
    }
    config.sim_config()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strobe_sim::TimeUnit;

    #[test]
    fn parse_empty_config_gives_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[sim]
seed = 42
time_limit = "1ms"
max_deltas = 500
fail_fast = false
waveform = "bench.vcd"

[clock]
period = 10
unit = "ns"
start_high = true

[reset]
delay = 20
unit = "ns"
active_low = false

[watchdog]
delay = 5
unit = "us"

[handshake]
timeout_cycles = 0
valid_only_when_ready = true
data_width = 8
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.sim.seed, 42);
        assert_eq!(config.sim.max_deltas, 500);
        assert!(!config.sim.fail_fast);
        assert_eq!(
            config.sim.waveform.as_deref(),
            Some(Path::new("bench.vcd"))
        );
        assert_eq!(config.clock.period, 10);
        assert!(config.clock.start_high);
        assert!(!config.reset.active_low);
        let watchdog = config.watchdog.as_ref().unwrap();
        assert_eq!((watchdog.delay, watchdog.unit), (5, TimeUnit::Us));
        assert_eq!(config.handshake.data_width, 8);

        let sim = config.sim_config().unwrap();
        assert_eq!(sim.time_limit, Some(1_000_000_000_000));
        let send = config.send_options();
        assert!(send.valid_only_when_ready);
        assert_eq!(send.timeout_cycles, 0);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = load_config_from_str("[clock]\nperiod = 8\n").unwrap();
        assert_eq!(config.clock.period, 8);
        assert_eq!(config.clock.unit, TimeUnit::Ns);
        assert!(!config.clock.start_high);
        assert_eq!(config.handshake.timeout_cycles, 128);
    }

    #[test]
    fn short_clock_period_errors() {
        let err = load_config_from_str("[clock]\nperiod = 1\nunit = \"fs\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ValidationError {
                key: "clock.period",
                ..
            }
        ));
    }

    #[test]
    fn zero_data_width_errors() {
        let err = load_config_from_str("[handshake]\ndata_width = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn oversized_data_width_errors() {
        let err = load_config_from_str("[handshake]\ndata_width = 129\n").unwrap_err();
        assert!(err.to_string().contains("1..=128"));
    }

    #[test]
    fn zero_watchdog_delay_errors() {
        let err = load_config_from_str("[watchdog]\ndelay = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn bad_time_limit_errors() {
        let err = load_config_from_str("[sim]\ntime_limit = \"10 parsecs\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn unknown_unit_is_a_parse_error() {
        let err = load_config_from_str("[clock]\nunit = \"hours\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_toml_errors() {
        let toml = "this is not valid toml {{{}}}";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[handshake]\ndata_width = 4\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.handshake.data_width, 4);
        let same = load_config_from_dir(dir.path()).unwrap();
        assert_eq!(config, same);
    }

    #[test]
    fn missing_file_in_dir_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from_dir(dir.path()).unwrap();
        assert_eq!(config, BenchConfig::default());
    }

    #[test]
    fn io_error_from_nonexistent_path() {
        let err = load_config(Path::new("/nonexistent/dir/strobe.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
        assert!(err.to_string().contains("/nonexistent/dir/strobe.toml"));
    }
}
