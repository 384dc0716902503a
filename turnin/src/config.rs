// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use turnin_core::adapters::ssh::SshOptions;
use turnin_core::app::services::host_keys::HostKeyMode;
use turnin_core::app::types::{SshTarget, Timeouts, TrustedHostKey};
use turnin_core::app::usecases::DEFAULT_REMOTE_DIR;
use turnin_core::SubmitSettings;

const APP_DIR_NAME: &str = "turnin";
const CONFIG_FILE_NAME: &str = "turnin.toml";
const CONFIG_ENV_VAR: &str = "TURNIN_CONFIG_PATH";
const DEFAULT_GATEWAY_HOST: &str = "scylla.cs.uoi.gr";
const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_KNOWN_HOSTS: &str = "~/.ssh/turnin_known_hosts";
const DEFAULT_KEEPALIVE_SECS: u64 = 15;

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    gateway_host: Option<String>,
    gateway_port: Option<u16>,
    worker_port: Option<u16>,
    username: Option<String>,
    remote_dir: Option<String>,
    cluster_status_command: Option<String>,
    worker_marker: Option<String>,
    known_hosts_path: Option<String>,
    host_key_mode: Option<String>,
    connect_timeout_secs: Option<u64>,
    handshake_timeout_secs: Option<u64>,
    auth_timeout_secs: Option<u64>,
    exec_timeout_secs: Option<u64>,
    keepalive_secs: Option<u64>,
    keyboard_interactive_fallback: Option<bool>,
    confirmations: Option<Vec<String>>,
    cleanup_staging: Option<bool>,
    verbose: Option<bool>,
    #[serde(default)]
    pinned_keys: Vec<FilePinnedKey>,
}

#[derive(Debug, Deserialize)]
struct FilePinnedKey {
    hostname: String,
    key_type: String,
    key: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: SshTarget,
    pub worker_port: u16,
    pub username: Option<String>,
    pub remote_dir: String,
    pub cluster_status_command: String,
    pub worker_marker: String,
    pub known_hosts_path: PathBuf,
    pub host_key_mode: HostKeyMode,
    pub timeouts: Timeouts,
    pub keepalive_secs: u64,
    pub keyboard_interactive_fallback: bool,
    pub confirmations: Vec<String>,
    pub cleanup_staging: bool,
    pub verbose: bool,
    pub pinned_keys: Vec<TrustedHostKey>,
    pub config_path: Option<PathBuf>,
}

impl Config {
    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            timeouts: self.timeouts,
            keyboard_interactive_fallback: self.keyboard_interactive_fallback,
            keepalive_secs: self.keepalive_secs,
        }
    }

    pub fn submit_settings(&self) -> SubmitSettings {
        SubmitSettings {
            worker_port: self.worker_port,
            cluster_status_command: self.cluster_status_command.clone(),
            worker_marker: self.worker_marker.clone(),
            confirmations: self.confirmations.clone(),
            exec_timeout: self.timeouts.exec,
            cleanup_staging: self.cleanup_staging,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Env,
    ConfigFile,
    Default,
}

impl ConfigSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigSource::Override => "override",
            ConfigSource::Env => "env",
            ConfigSource::ConfigFile => "config",
            ConfigSource::Default => "default",
        }
    }
}

#[derive(Debug)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config_path: Option<PathBuf>,
    pub config_path_source: Option<ConfigSource>,
    pub config_file_present: bool,
    pub gateway_host: ConfigValue<String>,
    pub username: ConfigValue<Option<String>>,
    pub remote_dir: ConfigValue<String>,
    pub known_hosts_path: ConfigValue<PathBuf>,
    pub host_key_mode: ConfigValue<HostKeyMode>,
    pub verbose: ConfigValue<bool>,
}

impl ConfigReport {
    pub fn log(&self) {
        match (&self.config_path, self.config_path_source) {
            (Some(path), Some(source)) => tracing::info!(
                path = %path.display(),
                source = source.as_str(),
                present = self.config_file_present,
                "config file"
            ),
            _ => tracing::info!("no config file location available"),
        }
        tracing::info!(
            value = %self.gateway_host.value,
            source = self.gateway_host.source.as_str(),
            "gateway_host"
        );
        tracing::info!(
            value = self.username.value.as_deref().unwrap_or("<prompt>"),
            source = self.username.source.as_str(),
            "username"
        );
        tracing::info!(
            value = %self.remote_dir.value,
            source = self.remote_dir.source.as_str(),
            "remote_dir"
        );
        tracing::info!(
            value = %self.known_hosts_path.value.display(),
            source = self.known_hosts_path.source.as_str(),
            "known_hosts_path"
        );
        tracing::info!(
            value = self.host_key_mode.value.as_str(),
            source = self.host_key_mode.source.as_str(),
            "host_key_mode"
        );
        tracing::debug!(
            value = self.verbose.value,
            source = self.verbose.source.as_str(),
            "verbose"
        );
    }
}

#[derive(Debug)]
pub struct LoadResult {
    pub config: Config,
    pub report: ConfigReport,
}

#[derive(Debug, Default)]
pub struct Overrides {
    pub username: Option<String>,
    pub remote_dir: Option<String>,
    pub host_key_mode: Option<HostKeyMode>,
    pub verbose: Option<bool>,
}

#[cfg(test)]
pub fn load(config_path_override: Option<PathBuf>, overrides: Overrides) -> Result<Config> {
    Ok(load_with_report(config_path_override, overrides)?.config)
}

/// Later sources win: default, then config file, then override.
fn pick<T>(overridden: Option<T>, from_file: Option<T>, default: impl FnOnce() -> T) -> ConfigValue<T> {
    match (overridden, from_file) {
        (Some(value), _) => ConfigValue {
            value,
            source: ConfigSource::Override,
        },
        (None, Some(value)) => ConfigValue {
            value,
            source: ConfigSource::ConfigFile,
        },
        (None, None) => ConfigValue {
            value: default(),
            source: ConfigSource::Default,
        },
    }
}

pub fn load_with_report(
    config_path_override: Option<PathBuf>,
    overrides: Overrides,
) -> Result<LoadResult> {
    let (config_path, config_path_source, required) = match config_path_override {
        Some(path) => (Some(expand_path(path)), Some(ConfigSource::Override), true),
        None => match config_path_from_env()? {
            Some(path) => (Some(expand_path(path)), Some(ConfigSource::Env), true),
            None => match default_config_path().ok() {
                Some(path) => (Some(path), Some(ConfigSource::Default), false),
                None => (None, None, false),
            },
        },
    };
    let config_file_present = config_path
        .as_deref()
        .map(|path| path.exists())
        .unwrap_or(false);

    let file_config = match config_path.as_deref() {
        Some(path) => read_config_file(path, required)?,
        None => FileConfig::default(),
    };
    let base_dir = config_path.as_deref().and_then(|path| path.parent());

    let gateway_host = pick(None, file_config.gateway_host, || {
        DEFAULT_GATEWAY_HOST.to_string()
    });
    if gateway_host.value.trim().is_empty() {
        anyhow::bail!("gateway_host must not be empty");
    }
    let username = pick(
        overrides.username.map(Some),
        file_config.username.map(Some),
        || None,
    );
    let remote_dir = pick(overrides.remote_dir, file_config.remote_dir, || {
        DEFAULT_REMOTE_DIR.to_string()
    });
    if remote_dir.value.trim_matches('/').is_empty() {
        anyhow::bail!("remote_dir must name a directory under the remote home");
    }
    let known_hosts_path = pick(
        None,
        file_config
            .known_hosts_path
            .map(|raw| resolve_path(&raw, base_dir)),
        || expand_path(PathBuf::from(DEFAULT_KNOWN_HOSTS)),
    );
    let file_mode = file_config
        .host_key_mode
        .map(|raw| raw.parse::<HostKeyMode>())
        .transpose()
        .context("invalid host_key_mode in config file")?;
    let host_key_mode = pick(overrides.host_key_mode, file_mode, || HostKeyMode::Interactive);
    let verbose = pick(overrides.verbose, file_config.verbose, || false);

    let gateway_port = file_config.gateway_port.unwrap_or(DEFAULT_SSH_PORT);
    let worker_port = file_config.worker_port.unwrap_or(DEFAULT_SSH_PORT);
    if gateway_port == 0 || worker_port == 0 {
        anyhow::bail!("ports must be between 1 and 65535");
    }

    let defaults = Timeouts::default();
    let timeouts = Timeouts {
        connect: secs_or(file_config.connect_timeout_secs, defaults.connect, "connect_timeout_secs")?,
        handshake: secs_or(
            file_config.handshake_timeout_secs,
            defaults.handshake,
            "handshake_timeout_secs",
        )?,
        auth: secs_or(file_config.auth_timeout_secs, defaults.auth, "auth_timeout_secs")?,
        exec: secs_or(file_config.exec_timeout_secs, defaults.exec, "exec_timeout_secs")?,
    };

    let pinned_keys = file_config
        .pinned_keys
        .into_iter()
        .map(|pin| TrustedHostKey::new(pin.hostname, pin.key_type, pin.key))
        .collect();

    let config = Config {
        gateway: SshTarget::new(gateway_host.value.clone(), gateway_port),
        worker_port,
        username: username.value.clone(),
        remote_dir: remote_dir.value.clone(),
        cluster_status_command: file_config
            .cluster_status_command
            .unwrap_or_else(|| SubmitSettings::default().cluster_status_command),
        worker_marker: file_config
            .worker_marker
            .unwrap_or_else(|| SubmitSettings::default().worker_marker),
        known_hosts_path: known_hosts_path.value.clone(),
        host_key_mode: host_key_mode.value,
        timeouts,
        keepalive_secs: file_config.keepalive_secs.unwrap_or(DEFAULT_KEEPALIVE_SECS),
        keyboard_interactive_fallback: file_config.keyboard_interactive_fallback.unwrap_or(true),
        confirmations: file_config
            .confirmations
            .unwrap_or_else(|| SubmitSettings::default().confirmations),
        cleanup_staging: file_config.cleanup_staging.unwrap_or(false),
        verbose: verbose.value,
        pinned_keys,
        config_path: config_path.clone(),
    };

    let report = ConfigReport {
        config_path,
        config_path_source,
        config_file_present,
        gateway_host,
        username,
        remote_dir,
        known_hosts_path,
        host_key_mode,
        verbose,
    };

    Ok(LoadResult { config, report })
}

fn secs_or(value: Option<u64>, default: Duration, key: &str) -> Result<Duration> {
    match value {
        Some(0) => anyhow::bail!("{key} must be at least 1"),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

fn read_config_file(path: &Path, required: bool) -> Result<FileConfig> {
    if !path.exists() {
        if required {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(FileConfig::default());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

fn resolve_path(raw: &str, base_dir: Option<&Path>) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        return path;
    }
    match base_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn expand_path(path: PathBuf) -> PathBuf {
    let path_string = path.to_string_lossy().to_string();
    let expanded = shellexpand::tilde(&path_string);
    PathBuf::from(expanded.as_ref())
}

fn config_path_from_env() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_ENV_VAR) {
        Some(value) => {
            if value.is_empty() {
                anyhow::bail!("{CONFIG_ENV_VAR} is set but empty");
            }
            Ok(Some(PathBuf::from(value)))
        }
        None => Ok(None),
    }
}

fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("failed to resolve config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}
