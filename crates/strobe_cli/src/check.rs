//! The `strobe check` command.

use std::error::Error;
use std::path::Path;

use strobe_config::{load_config, load_config_from_dir, BenchConfig};

use crate::{CheckArgs, GlobalArgs};

/// Loads the configuration named by `--config`, or `strobe.toml` in the
/// current directory, falling back to defaults when that file is absent.
pub fn resolve_config(global: &GlobalArgs) -> Result<BenchConfig, Box<dyn Error>> {
    let config = match &global.config {
        Some(path) => load_config(Path::new(path))?,
        None => load_config_from_dir(Path::new("."))?,
    };
    Ok(config)
}

/// Runs the `strobe check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let config = resolve_config(global)?;
    if !global.quiet {
        eprintln!("   Checked configuration");
    }
    println!("{}", render(&config, args.json)?);
    Ok(0)
}

fn render(config: &BenchConfig, json: bool) -> Result<String, Box<dyn Error>> {
    if json {
        Ok(serde_json::to_string_pretty(config)?)
    } else {
        Ok(toml::to_string(config)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_with(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config,
        }
    }

    #[test]
    fn resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "[clock]\nperiod = 10\n").unwrap();
        let global = global_with(Some(path.to_string_lossy().into_owned()));
        let config = resolve_config(&global).unwrap();
        assert_eq!(config.clock.period, 10);
    }

    #[test]
    fn resolve_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(&path, "[handshake]\ndata_width = 0\n").unwrap();
        let global = global_with(Some(path.to_string_lossy().into_owned()));
        let err = resolve_config(&global).unwrap_err();
        assert!(err.to_string().contains("data_width"));
    }

    #[test]
    fn resolve_missing_explicit_path_errors() {
        let global = global_with(Some("/nonexistent/strobe.toml".to_string()));
        assert!(resolve_config(&global).is_err());
    }

    #[test]
    fn render_toml_round_trips() {
        let config = BenchConfig::default();
        let text = render(&config, false).unwrap();
        assert!(text.contains("[handshake]"));
        let back = strobe_config::load_config_from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn render_json() {
        let text = render(&BenchConfig::default(), true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["handshake"]["timeout_cycles"], 128);
    }
}
