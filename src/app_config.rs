//! Application configuration loading for CLI defaults.
//!
//! Precedence, highest first: command-line flags, the TOML config file, and
//! the library's contractual defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use harvester_core::discovery::CrawlConfig;
use harvester_core::download::DownloadLimits;
use harvester_core::download::constants::MIB;
use serde::Deserialize;

use crate::cli::{CrawlArgs, FetchArgs};

/// TOML-backed file configuration for harvester defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Maximum images accepted per discovery run.
    pub max_resources: Option<usize>,
    /// Wall-clock limit of a crawl in seconds.
    pub max_crawl_secs: Option<u64>,
    /// Timeout for each page fetch in seconds.
    pub page_timeout_secs: Option<u64>,
    /// Consult robots.txt before fetching pages.
    pub check_robots: Option<bool>,
    /// Concurrent image fetches.
    pub concurrency: Option<usize>,
    /// Timeout for each image fetch in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Per-file size cap in MiB.
    pub max_file_mib: Option<u64>,
    /// Per-batch size cap in MiB.
    pub max_total_mib: Option<u64>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(max_resources) = self.max_resources
            && !(1..=10_000).contains(&max_resources)
        {
            bail!(
                "Invalid config value for `max_resources`: {max_resources}. Expected range: 1..=10000"
            );
        }
        if let Some(concurrency) = self.concurrency
            && !(1..=16).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=16");
        }
        validate_timeout_secs("max_crawl_secs", self.max_crawl_secs)?;
        validate_timeout_secs("page_timeout_secs", self.page_timeout_secs)?;
        validate_timeout_secs("fetch_timeout_secs", self.fetch_timeout_secs)?;
        validate_mib("max_file_mib", self.max_file_mib, 1024)?;
        validate_mib("max_total_mib", self.max_total_mib, 10 * 1024)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

fn validate_mib(field: &str, value: Option<u64>, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={max}");
    }
    Ok(())
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Log filter used when neither `RUST_LOG` nor a CLI flag decides.
    #[must_use]
    pub fn filter(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose => "debug",
            Self::Quiet => "error",
            Self::Debug => "trace",
        }
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    /// True if a config file was read.
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` if given (it must exist), otherwise from the
/// default path if a file is present there.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig::default());
    };
    if !path_ref.exists() {
        return Ok(LoadedConfig { path, config: None });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Merges CLI flags, file config, and defaults into crawl limits.
#[must_use]
pub fn resolve_crawl_config(file: Option<&FileConfig>, cli: &CrawlArgs) -> CrawlConfig {
    let defaults = CrawlConfig::default();
    let file = file.cloned().unwrap_or_default();
    CrawlConfig {
        max_resources: cli
            .max_resources
            .or(file.max_resources)
            .unwrap_or(defaults.max_resources),
        max_elapsed: cli
            .max_crawl_secs
            .or(file.max_crawl_secs)
            .map_or(defaults.max_elapsed, Duration::from_secs),
        page_timeout: file
            .page_timeout_secs
            .map_or(defaults.page_timeout, Duration::from_secs),
        check_robots: !cli.no_robots && file.check_robots.unwrap_or(defaults.check_robots),
        ..defaults
    }
}

/// Merges CLI flags, file config, and defaults into download limits.
#[must_use]
pub fn resolve_download_limits(file: Option<&FileConfig>, cli: &FetchArgs) -> DownloadLimits {
    let defaults = DownloadLimits::default();
    let file = file.cloned().unwrap_or_default();
    DownloadLimits {
        concurrency: cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(defaults.concurrency),
        fetch_timeout: cli
            .fetch_timeout_secs
            .or(file.fetch_timeout_secs)
            .map_or(defaults.fetch_timeout, Duration::from_secs),
        max_file_bytes: file
            .max_file_mib
            .map_or(defaults.max_file_bytes, |mib| mib * MIB),
        max_total_bytes: file
            .max_total_mib
            .map_or(defaults.max_total_bytes, |mib| mib * MIB),
        ..defaults
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use super::*;

    fn crawl_args() -> CrawlArgs {
        CrawlArgs {
            max_resources: None,
            max_crawl_secs: None,
            no_robots: false,
        }
    }

    fn fetch_args() -> FetchArgs {
        FetchArgs {
            concurrency: None,
            fetch_timeout_secs: None,
        }
    }

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
concurrency = 2
verbosity = "verbose"
"#,
        )
        .unwrap();
        assert_eq!(cfg.concurrency, Some(2));
        assert_eq!(cfg.verbosity, Some(VerbositySetting::Verbose));
        assert!(cfg.max_resources.is_none());
    }

    #[test]
    fn test_parse_config_supports_comments() {
        let cfg = parse_config_str(
            r#"
# crawl settings
max_resources = 50 # smaller runs
check_robots = false
"#,
        )
        .unwrap();
        assert_eq!(cfg.max_resources, Some(50));
        assert_eq!(cfg.check_robots, Some(false));
    }

    #[test]
    fn test_parse_config_rejects_invalid_concurrency() {
        let err = parse_config_str("concurrency = 0").unwrap_err();
        assert!(err.to_string().contains("concurrency"), "got: {err}");
        let err = parse_config_str("concurrency = 17").unwrap_err();
        assert!(err.to_string().contains("concurrency"), "got: {err}");
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout() {
        let err = parse_config_str("fetch_timeout_secs = 0").unwrap_err();
        assert!(err.to_string().contains("fetch_timeout_secs"), "got: {err}");
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        assert!(parse_config_str("rate_limit = 100").is_err());
    }

    #[test]
    fn test_parse_config_rejects_unknown_verbosity() {
        assert!(parse_config_str(r#"verbosity = "loud""#).is_err());
    }

    #[test]
    fn test_verbosity_filter() {
        assert_eq!(VerbositySetting::Default.filter(), "info");
        assert_eq!(VerbositySetting::Quiet.filter(), "error");
        assert_eq!(VerbositySetting::Debug.filter(), "trace");
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_total_mib = 20").unwrap();
        let loaded = load_config(Some(file.path())).unwrap();
        assert!(loaded.loaded_from_file());
        assert_eq!(loaded.config.unwrap().max_total_mib, Some(20));
    }

    #[test]
    fn test_load_config_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_resolve_crawl_config_precedence() {
        let file = FileConfig {
            max_resources: Some(40),
            max_crawl_secs: Some(30),
            page_timeout_secs: Some(5),
            check_robots: Some(true),
            ..FileConfig::default()
        };
        let cli = CrawlArgs {
            max_resources: Some(20),
            max_crawl_secs: None,
            no_robots: true,
        };
        let config = resolve_crawl_config(Some(&file), &cli);
        assert_eq!(config.max_resources, 20);
        assert_eq!(config.max_elapsed, Duration::from_secs(30));
        assert_eq!(config.page_timeout, Duration::from_secs(5));
        assert!(!config.check_robots);

        let defaults = resolve_crawl_config(None, &crawl_args());
        assert_eq!(defaults, CrawlConfig::default());
    }

    #[test]
    fn test_resolve_download_limits_precedence() {
        let file = FileConfig {
            concurrency: Some(2),
            max_file_mib: Some(5),
            max_total_mib: Some(50),
            ..FileConfig::default()
        };
        let limits = resolve_download_limits(Some(&file), &fetch_args());
        assert_eq!(limits.concurrency, 2);
        assert_eq!(limits.max_file_bytes, 5 * MIB);
        assert_eq!(limits.max_total_bytes, 50 * MIB);
        assert_eq!(limits.max_items, 100);

        let cli = FetchArgs {
            concurrency: Some(1),
            fetch_timeout_secs: Some(10),
        };
        let limits = resolve_download_limits(Some(&file), &cli);
        assert_eq!(limits.concurrency, 1);
        assert_eq!(limits.fetch_timeout, Duration::from_secs(10));

        assert_eq!(
            resolve_download_limits(None, &fetch_args()),
            DownloadLimits::default()
        );
    }
}
