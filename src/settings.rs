use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::database::{Database, DbError};
use crate::gemini::DEFAULT_BASE_URL;

pub const SETTINGS_KEY: &str = "creatorflow-settings";

const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Secrets shorter than this are masked completely
const MASK_MIN_VISIBLE_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub request_timeout_secs: u64,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_json: false,
        }
    }
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Overlay values from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("API_KEY")) {
            self.api_key = key;
        }
        if let Some(url) = get("CREATORFLOW_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = get("CREATORFLOW_TEXT_MODEL") {
            self.text_model = model;
        }
        if let Some(model) = get("CREATORFLOW_IMAGE_MODEL") {
            self.image_model = model;
        }
        if let Some(secs) = get("CREATORFLOW_TIMEOUT_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %secs, "ignoring invalid CREATORFLOW_TIMEOUT_SECS"),
            }
        }
        if let Some(flag) = get("CREATORFLOW_LOG_JSON") {
            self.log_json = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        self
    }

    /// Set one field by name, as used by `config set`
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "api_key" => self.api_key = value.to_string(),
            "base_url" => self.base_url = value.to_string(),
            "text_model" => self.text_model = value.to_string(),
            "image_model" => self.image_model = value.to_string(),
            "request_timeout_secs" => {
                self.request_timeout_secs = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout: {}", value))?
            }
            "log_json" => {
                self.log_json = value
                    .parse()
                    .map_err(|_| format!("Invalid boolean: {}", value))?
            }
            other => return Err(format!("Unknown setting: {}", other)),
        }
        Ok(())
    }
}

/// Settings as shown to the user, with the API key masked
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SettingsView {
    #[serde(flatten)]
    pub settings: Settings,
    pub api_key_set: bool,
}

impl From<Settings> for SettingsView {
    fn from(mut settings: Settings) -> Self {
        let api_key_set = settings.has_api_key();
        settings.api_key = mask_secret(&settings.api_key);
        Self {
            settings,
            api_key_set,
        }
    }
}

/// Mask a secret, keeping the last four characters of long ones
pub fn mask_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        return "(not set)".to_string();
    }
    let count = secret.chars().count();
    if count < MASK_MIN_VISIBLE_LEN {
        return "*".repeat(count);
    }
    let visible: String = secret.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), visible)
}

impl Database {
    /// Stored settings, or defaults when none are saved or they are unreadable
    pub fn get_settings(&self) -> Result<Settings, DbError> {
        let Some(raw) = self.kv_get(SETTINGS_KEY)? else {
            return Ok(Settings::default());
        };

        Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "stored settings are unreadable; using defaults");
            Settings::default()
        }))
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), DbError> {
        let raw = serde_json::to_string(settings)?;
        self.kv_set(SETTINGS_KEY, &raw)
    }
}
