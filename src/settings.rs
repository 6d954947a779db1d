use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::PollPolicy;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub(crate) const DEFAULT_TRANSLATOR_ENDPOINT: &str = "https://api.cognitive.microsofttranslator.com";
pub(crate) const DEFAULT_TRANSLATOR_API_VERSION: &str = "3.0";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OcrSettings {
    pub endpoint: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorSettings {
    pub endpoint: String,
    pub api_version: String,
    pub key: Option<String>,
    pub region: Option<String>,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TRANSLATOR_ENDPOINT.to_string(),
            api_version: DEFAULT_TRANSLATOR_API_VERSION.to_string(),
            key: None,
            region: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub fill_color: String,
    pub text_color: String,
    pub output_suffix: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            fill_color: "#ffffff".to_string(),
            text_color: "#000000".to_string(),
            output_suffix: "_output".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub ocr: OcrSettings,
    pub translator: TranslatorSettings,
    pub render: RenderSettings,
    pub poll: PollPolicy,
    pub http_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ocr: OcrSettings::default(),
            translator: TranslatorSettings::default(),
            render: RenderSettings::default(),
            poll: PollPolicy::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    ocr: Option<OcrSection>,
    translator: Option<TranslatorSection>,
    render: Option<RenderSection>,
    poll: Option<PollSection>,
    http: Option<HttpSection>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSection {
    endpoint: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TranslatorSection {
    endpoint: Option<String>,
    api_version: Option<String>,
    key: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSection {
    font_path: Option<String>,
    font_family: Option<String>,
    fill_color: Option<String>,
    text_color: Option<String>,
    output_suffix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PollSection {
    initial_interval_ms: Option<u64>,
    max_interval_ms: Option<u64>,
    max_attempts: Option<usize>,
    deadline_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpSection {
    timeout_secs: Option<u64>,
}

/// Loads settings from the bundled defaults, then `settings.toml`,
/// `settings.local.toml`, the same pair under `~/.photo-translator-rust/`, and
/// finally `extra_path`. Environment credentials override every file.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::from_toml_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse bundled settings")?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    settings.apply_env(get_env);
    Ok(settings)
}

impl Settings {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: SettingsFile = toml::from_str(content)?;
        let mut settings = Settings::default();
        settings.merge(parsed);
        Ok(settings)
    }

    /// Overrides credentials and endpoints with values from `lookup`, which
    /// maps environment variable names to non-empty values.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("AZURE_VISION_ENDPOINT") {
            self.ocr.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("AZURE_VISION_KEY") {
            self.ocr.key = Some(key);
        }
        if let Some(key) = lookup("AZURE_TRANSLATOR_KEY") {
            self.translator.key = Some(key);
        }
        if let Some(region) = lookup("AZURE_TRANSLATOR_REGION") {
            self.translator.region = Some(region);
        }
        if let Some(endpoint) = lookup("AZURE_TRANSLATOR_ENDPOINT") {
            self.translator.endpoint = endpoint;
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(ocr) = incoming.ocr {
            merge_optional(&mut self.ocr.endpoint, ocr.endpoint);
            merge_optional(&mut self.ocr.key, ocr.key);
        }
        if let Some(translator) = incoming.translator {
            merge_required(&mut self.translator.endpoint, translator.endpoint);
            merge_required(&mut self.translator.api_version, translator.api_version);
            merge_optional(&mut self.translator.key, translator.key);
            merge_optional(&mut self.translator.region, translator.region);
        }
        if let Some(render) = incoming.render {
            merge_optional(&mut self.render.font_path, render.font_path);
            merge_optional(&mut self.render.font_family, render.font_family);
            merge_required(&mut self.render.fill_color, render.fill_color);
            merge_required(&mut self.render.text_color, render.text_color);
            // An empty suffix would make the output overwrite the input.
            merge_required(&mut self.render.output_suffix, render.output_suffix);
        }
        if let Some(poll) = incoming.poll {
            if let Some(ms) = poll.initial_interval_ms {
                self.poll.initial_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = poll.max_interval_ms {
                self.poll.max_interval = Duration::from_millis(ms);
            }
            if let Some(attempts) = poll.max_attempts
                && attempts > 0
            {
                self.poll.max_attempts = attempts;
            }
            if let Some(secs) = poll.deadline_secs
                && secs > 0
            {
                self.poll.deadline = Duration::from_secs(secs);
            }
        }
        if let Some(http) = incoming.http
            && let Some(secs) = http.timeout_secs
            && secs > 0
        {
            self.http_timeout = Duration::from_secs(secs);
        }
    }
}

fn merge_optional(slot: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            *slot = Some(value.to_string());
        }
    }
}

fn merge_required(slot: &mut String, value: Option<String>) {
    if let Some(value) = value {
        let value = value.trim();
        if !value.is_empty() {
            *slot = value.to_string();
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".photo-translator-rust"))
        }
    })
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
