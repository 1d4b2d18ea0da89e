//! CLI argument definitions for the tercih binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Tercih: a Turkish assistant for university admissions questions.
#[derive(Parser, Debug)]
#[command(name = "tercih", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// JSON catalog of universities and departments.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Session id for this conversation; a random one when omitted.
    #[arg(short = 's', long = "session")]
    pub session: Option<String>,

    /// User id attached to new sessions.
    #[arg(short = 'u', long = "user", default_value = "cli")]
    pub user: String,

    /// Seconds between idle-session sweeps.
    #[arg(long = "sweep-interval-secs", default_value_t = 60)]
    pub sweep_interval_secs: u64,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TERCIH_CONFIG env var > platform default (~/.tercih/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TERCIH_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the catalog file.
    ///
    /// Priority: --catalog flag > config file value. `None` means the built-in catalog.
    pub fn resolve_catalog_path(&self, config_path: Option<&str>) -> Option<PathBuf> {
        self.catalog
            .clone()
            .or_else(|| config_path.map(PathBuf::from))
    }

    /// Resolve the log level: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tercih").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tercih").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["tercih"]);
        assert_eq!(args.user, "cli");
        assert_eq!(args.sweep_interval_secs, 60);
        assert!(args.session.is_none());
    }

    #[test]
    fn test_catalog_flag_overrides_config() {
        let args = CliArgs::parse_from(["tercih", "--catalog", "/tmp/a.json"]);
        assert_eq!(
            args.resolve_catalog_path(Some("/etc/b.json")),
            Some(PathBuf::from("/tmp/a.json"))
        );
        let args = CliArgs::parse_from(["tercih"]);
        assert_eq!(
            args.resolve_catalog_path(Some("/etc/b.json")),
            Some(PathBuf::from("/etc/b.json"))
        );
        assert_eq!(args.resolve_catalog_path(None), None);
    }

    #[test]
    fn test_log_level_resolution() {
        let args = CliArgs::parse_from(["tercih", "-l", "debug"]);
        assert_eq!(args.resolve_log_level("info"), "debug");
        let args = CliArgs::parse_from(["tercih"]);
        assert_eq!(args.resolve_log_level("warn"), "warn");
    }
}
