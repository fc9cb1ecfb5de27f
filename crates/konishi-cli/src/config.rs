//! `konishi` configuration file.
//!
//! Looked up in order:
//! 1. `--config PATH` (must exist)
//! 2. `config.toml` in the XDG config dir (`~/.config/konishi/`)
//! 3. built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use konishi_bom::{DEFAULT_PROBE_ORDER, DockerExecutorConfig, ManagerKind, OutputTargets};
use serde::Deserialize;
use tracing::debug;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Container runtime settings.
    pub docker: DockerConfig,
    /// Package-manager detection.
    pub probe: ProbeConfig,
    /// Default BOM output files.
    pub output: OutputConfig,
}

/// `[docker]` section.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DockerConfig {
    /// Docker binary name or path.
    pub binary: String,
    /// Seconds to wait for a graceful container exit.
    pub close_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        let defaults = DockerExecutorConfig::default();
        Self {
            binary: defaults.binary,
            close_timeout_secs: defaults.close_timeout.as_secs(),
        }
    }
}

/// `[probe]` section.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Managers to try, first match wins.
    pub order: Vec<ManagerKind>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_PROBE_ORDER.to_vec(),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// SPDX tag:value file.
    pub spdx: Option<PathBuf>,
    /// CycloneDX JSON file.
    pub cyclonedx_json: Option<PathBuf>,
    /// CycloneDX XML file.
    pub cyclonedx_xml: Option<PathBuf>,
}

impl Config {
    /// Load `explicit`, else the per-user file if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .wrap_err_with(|| format!("invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Executor settings from the `[docker]` section.
    pub fn executor(&self) -> DockerExecutorConfig {
        DockerExecutorConfig {
            binary: self.docker.binary.clone(),
            close_timeout: Duration::from_secs(self.docker.close_timeout_secs),
        }
    }

    /// Output files from the `[output]` section, each overridden by the
    /// matching command-line flag.
    pub fn outputs(
        &self,
        spdx: Option<PathBuf>,
        cyclonedx_json: Option<PathBuf>,
        cyclonedx_xml: Option<PathBuf>,
    ) -> OutputTargets {
        OutputTargets {
            spdx: spdx.or_else(|| self.output.spdx.clone()),
            cyclonedx_json: cyclonedx_json.or_else(|| self.output.cyclonedx_json.clone()),
            cyclonedx_xml: cyclonedx_xml.or_else(|| self.output.cyclonedx_xml.clone()),
        }
    }
}

fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "konishi", "konishi")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").expect("parse");
        assert_eq!(config.docker.binary, "docker");
        assert_eq!(config.docker.close_timeout_secs, 5);
        assert_eq!(config.probe.order, DEFAULT_PROBE_ORDER);
        assert!(config.outputs(None, None, None).is_empty());
    }

    #[test]
    fn sections_parse() {
        let config: Config = toml::from_str(
            r#"
            [docker]
            binary = "podman"
            close_timeout_secs = 2

            [probe]
            order = ["rpm", "dpkg"]

            [output]
            spdx = "bom.spdx"
            "#,
        )
        .expect("parse");
        assert_eq!(config.executor().binary, "podman");
        assert_eq!(config.executor().close_timeout, Duration::from_secs(2));
        assert_eq!(config.probe.order, [ManagerKind::Rpm, ManagerKind::Dpkg]);
        assert_eq!(config.output.spdx, Some(PathBuf::from("bom.spdx")));
    }

    #[test]
    fn flags_override_file_outputs() {
        let config: Config = toml::from_str(
            r#"
            [output]
            spdx = "file.spdx"
            cyclonedx_xml = "file.xml"
            "#,
        )
        .expect("parse");
        let targets = config.outputs(Some(PathBuf::from("flag.spdx")), None, None);
        assert_eq!(targets.spdx, Some(PathBuf::from("flag.spdx")));
        assert_eq!(targets.cyclonedx_xml, Some(PathBuf::from("file.xml")));
        assert_eq!(targets.cyclonedx_json, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = toml::from_str::<Config>("[docker]\nbinray = \"docker\"\n").expect_err("typo");
        assert!(err.to_string().contains("binray"));
    }

    #[test]
    fn unknown_manager_is_rejected() {
        assert!(toml::from_str::<Config>("[probe]\norder = [\"pacman\"]\n").is_err());
    }

    #[test]
    fn explicit_missing_file_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.toml");
        let err = Config::load(Some(&path)).expect_err("missing");
        assert!(format!("{err:#}").contains("absent.toml"));
    }
}
