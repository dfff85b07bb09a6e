//! Config file loading for CLI defaults.
//!
//! The file uses a flat `key = value` subset of TOML. Every key is optional;
//! values given on the command line always win.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

/// File-backed defaults for a crawl run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Storage root for PDFs and the history file.
    pub output_dir: Option<PathBuf>,
    /// Concurrent downloads per level.
    pub workers: Option<u8>,
    /// Global request rate in requests per second.
    pub rps: Option<f64>,
    /// HTTP retries after the first attempt.
    pub retries: Option<u32>,
    /// HTTP retry backoff factor in seconds.
    pub backoff: Option<f64>,
    /// Metadata API timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Contact email for the open-access index.
    pub unpaywall_email: Option<String>,
    /// Comma-separated mirror base URLs.
    pub mirrors: Option<String>,
    /// Comma-separated young-author affiliation keywords.
    pub young_keywords: Option<String>,
}

impl FileConfig {
    /// Validates values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(1..=64).contains(&workers)
        {
            bail!("Invalid config value for `workers`: {workers}. Expected range: 1..=64");
        }
        if let Some(retries) = self.retries
            && retries > 10
        {
            bail!("Invalid config value for `retries`: {retries}. Expected range: 0..=10");
        }
        if let Some(rps) = self.rps
            && rps < 0.0
        {
            bail!("Invalid config value for `rps`: {rps}. Expected range: >= 0");
        }
        if let Some(backoff) = self.backoff
            && !(0.0..=60.0).contains(&backoff)
        {
            bail!("Invalid config value for `backoff`: {backoff}. Expected range: 0..=60");
        }
        if let Some(timeout) = self.timeout_secs
            && !(timeout > 0.0 && timeout <= 3600.0)
        {
            bail!("Invalid config value for `timeout_secs`: {timeout}. Expected range: (0, 3600]");
        }
        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/refcrawler/config.toml`
/// 2. `$HOME/.config/refcrawler/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("refcrawler")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("refcrawler")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from an explicit `--config` path, or the default path if present.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    };

    if !path_ref.exists() {
        return Ok(LoadedConfig {
            path,
            config: None,
            loaded_from_file: false,
        });
    }

    let config = load_file_config(path_ref)?;
    Ok(LoadedConfig {
        path,
        config: Some(config),
        loaded_from_file: true,
    })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;

        match key {
            "output_dir" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `output_dir` value on line {line_no}"))?;
                cfg.output_dir = Some(PathBuf::from(parsed));
            }
            "workers" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `workers` value on line {line_no}"))?;
                let n = u8::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("workers out of range for u8"))?;
                cfg.workers = Some(n);
            }
            "rps" => {
                cfg.rps = Some(
                    parse_float(value)
                        .with_context(|| format!("Invalid `rps` value on line {line_no}"))?,
                );
            }
            "retries" => {
                let parsed = parse_integer_u64(value)
                    .with_context(|| format!("Invalid `retries` value on line {line_no}"))?;
                let n = u32::try_from(parsed)
                    .map_err(|_| anyhow::anyhow!("retries out of range for u32"))?;
                cfg.retries = Some(n);
            }
            "backoff" => {
                cfg.backoff = Some(
                    parse_float(value)
                        .with_context(|| format!("Invalid `backoff` value on line {line_no}"))?,
                );
            }
            "timeout_secs" => {
                cfg.timeout_secs = Some(
                    parse_float(value).with_context(|| {
                        format!("Invalid `timeout_secs` value on line {line_no}")
                    })?,
                );
            }
            "unpaywall_email" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `unpaywall_email` value on line {line_no}")
                })?;
                cfg.unpaywall_email = Some(parsed);
            }
            "mirrors" => {
                let parsed = parse_string_literal(value)
                    .with_context(|| format!("Invalid `mirrors` value on line {line_no}"))?;
                cfg.mirrors = Some(parsed);
            }
            "young_keywords" => {
                let parsed = parse_string_literal(value).with_context(|| {
                    format!("Invalid `young_keywords` value on line {line_no}")
                })?;
                cfg.young_keywords = Some(parsed);
            }
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected numeric value");
    }
    let value = token.parse::<f64>()?;
    if !value.is_finite() {
        bail!("Expected finite number");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
workers = 8
unpaywall_email = "me@example.org"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.workers, Some(8));
        assert_eq!(cfg.unpaywall_email.as_deref(), Some("me@example.org"));
        assert!(cfg.output_dir.is_none());
        assert!(cfg.rps.is_none());
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
output_dir = "/data/pdfs"
workers = 2
rps = 1.5
retries = 5
backoff = 0.25
timeout_secs = 30
unpaywall_email = "lab@example.org"
mirrors = "https://m1.example, https://m2.example"
young_keywords = "student, phd"
"#,
        )
        .expect("full config should parse");
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/data/pdfs")));
        assert_eq!(cfg.workers, Some(2));
        assert_eq!(cfg.rps, Some(1.5));
        assert_eq!(cfg.retries, Some(5));
        assert_eq!(cfg.backoff, Some(0.25));
        assert_eq!(cfg.timeout_secs, Some(30.0));
        assert_eq!(
            cfg.mirrors.as_deref(),
            Some("https://m1.example, https://m2.example")
        );
        assert_eq!(cfg.young_keywords.as_deref(), Some("student, phd"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_workers() {
        let err = parse_config_str("workers = 0").expect_err("invalid workers expected");
        assert!(
            err.to_string().contains("workers"),
            "expected workers validation error"
        );
    }

    #[test]
    fn test_parse_config_rejects_invalid_retries() {
        let err = parse_config_str("retries = 11").expect_err("invalid retries expected");
        assert!(err.to_string().contains("retries"));
    }

    #[test]
    fn test_parse_config_rejects_negative_rps() {
        let err = parse_config_str("rps = -2").expect_err("negative rps expected");
        assert!(err.to_string().contains("rps"));
    }

    #[test]
    fn test_parse_config_rejects_zero_timeout() {
        let err = parse_config_str("timeout_secs = 0").expect_err("zero timeout expected");
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_numeric_values_with_trailing_tokens() {
        let err =
            parse_config_str("workers = 4 trailing").expect_err("expected trailing token error");
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        let err = parse_config_str("mirrors = https://m1.example")
            .expect_err("expected quoted string error");
        assert!(err.to_string().contains("mirrors"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("concurrency = 4").expect_err("unknown key expected");
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("workers 4").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_supports_inline_comments() {
        let cfg = parse_config_str(
            r#"
workers = 4 # per level
unpaywall_email = "a#b@example.org" # hash inside string is kept
"#,
        )
        .expect("config with comments should parse");
        assert_eq!(cfg.workers, Some(4));
        assert_eq!(cfg.unpaywall_email.as_deref(), Some("a#b@example.org"));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "rps = 3\n").expect("write config");

        let loaded = load_config(Some(&path)).expect("explicit config should load");
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.and_then(|c| c.rps), Some(3.0));
    }

    #[test]
    fn test_load_config_explicit_missing_file_errors() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let err = load_config(Some(&dir.path().join("absent.toml")))
            .expect_err("missing explicit config should fail");
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
