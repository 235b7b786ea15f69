use anyhow::{bail, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const APP_DIR_NAME: &str = "survey-digest";
pub const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_PROVIDER: &str = "openai";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_CONTEXT_WINDOW: usize = 100_000;
pub const DEFAULT_RESERVE: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: std::collections::BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Profile {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Context window of the model, in tokens.
    pub context_window: Option<usize>,
    /// Tokens held back from the window for the prompt template and the answer.
    pub reserve: Option<usize>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let base = config_dir().context("unable to resolve OS config directory")?;
    Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

pub fn ensure_config_parent_exists(path: &PathBuf) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating config dir: {}", parent.display()))?;
    }
    Ok(())
}

pub fn load_config_if_exists(path: &PathBuf) -> Result<Option<AppConfig>> {
    if path.exists() {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file: {}", path.display()))?;
        let cfg: AppConfig = toml::from_str(&text).context("failed to parse config TOML")?;
        Ok(Some(cfg))
    } else {
        Ok(None)
    }
}

pub fn write_config(path: &PathBuf, cfg: &AppConfig) -> Result<()> {
    ensure_config_parent_exists(path)?;
    let text = toml::to_string_pretty(cfg).context("serializing config to TOML")?;
    fs::write(path, text).with_context(|| format!("writing config file: {}", path.display()))?;
    Ok(())
}

/// Settings fixed for the whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub context_window: usize,
    pub reserve: usize,
}

impl EffectiveSettings {
    /// Largest token estimate a chunk may reach.
    pub fn chunk_ceiling(&self) -> usize {
        self.context_window.saturating_sub(self.reserve)
    }
}

/// Values given on the command line; each one wins over the profile.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides<'a> {
    pub provider: Option<&'a str>,
    pub model: Option<&'a str>,
    pub temperature: Option<f32>,
    pub context_window: Option<usize>,
    pub reserve: Option<usize>,
}

pub fn resolve_effective_settings(
    profile_override: Option<&str>,
    cli: CliOverrides<'_>,
) -> Result<EffectiveSettings> {
    let path = default_config_path()?;
    let cfg = load_config_if_exists(&path)?;
    merge_settings(cfg.as_ref(), profile_override, cli)
}

pub fn merge_settings(
    cfg: Option<&AppConfig>,
    profile_override: Option<&str>,
    cli: CliOverrides<'_>,
) -> Result<EffectiveSettings> {
    let mut profile = Profile::default();
    if let Some(cfg) = cfg {
        let profile_name = profile_override
            .map(|s| s.to_string())
            .or_else(|| cfg.default_profile.clone())
            .unwrap_or_else(|| "default".to_string());
        if let Some(p) = cfg.profiles.get(&profile_name) {
            profile = p.clone();
        }
    }

    let provider = cli.provider.map(str::to_string).or(profile.provider).unwrap_or_else(|| DEFAULT_PROVIDER.to_string());
    let model = cli.model.map(str::to_string).or(profile.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let temperature = cli.temperature.or(profile.temperature).unwrap_or(DEFAULT_TEMPERATURE);
    let context_window = cli.context_window.or(profile.context_window).unwrap_or(DEFAULT_CONTEXT_WINDOW);
    let reserve = cli.reserve.or(profile.reserve).unwrap_or(DEFAULT_RESERVE);

    if context_window <= reserve {
        bail!("invalid budget: context window {} must exceed reserve {}", context_window, reserve);
    }
    if !(0.0..=2.0).contains(&temperature) {
        bail!("invalid temperature {}: expected a value between 0 and 2", temperature);
    }

    Ok(EffectiveSettings { provider, model, temperature, context_window, reserve })
}
