//! Recognised runtime configuration keys.
//!
//! The core never reads a config file itself — an embedding application
//! loads whatever format it likes and either sets fields directly or hands
//! the parsed JSON to [`RuntimeConfig::merge_json`]. The only ingestion path
//! the core implements on its own is [`RuntimeConfig::from_env`].

use crate::synapse::error::CoreError;
use serde_json::Value;
use std::env;

/// The fixed set of keys the runtime recognises. Unrecognised keys
/// encountered during ingestion are ignored, not errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    pub name: Option<String>,
    pub alias: Option<String>,
    pub log_level: Option<String>,
    pub auto_save: Option<bool>,
    pub message_adapter: Option<String>,
    pub nlu_adapter: Option<String>,
    pub storage_adapter: Option<String>,
    pub webhook_adapter: Option<String>,
    pub analytics_adapter: Option<String>,
    pub nlu_min_length: Option<usize>,
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `{PREFIX}_{KEY}` environment variables (hyphen-case keys
    /// upper-cased with underscores) into a fresh config.
    pub fn from_env(prefix: &str) -> Self {
        let mut config = Self::new();
        config.load_env(prefix);
        config
    }

    fn load_env(&mut self, prefix: &str) {
        let read = |key: &str| env::var(format!("{prefix}_{key}")).ok();

        self.name = read("NAME");
        self.alias = read("ALIAS");
        self.log_level = read("LOG_LEVEL");
        self.auto_save = read("AUTO_SAVE").and_then(|v| v.parse().ok());
        self.message_adapter = read("MESSAGE_ADAPTER");
        self.nlu_adapter = read("NLU_ADAPTER");
        self.storage_adapter = read("STORAGE_ADAPTER");
        self.webhook_adapter = read("WEBHOOK_ADAPTER");
        self.analytics_adapter = read("ANALYTICS_ADAPTER");
        self.nlu_min_length = read("NLU_MIN_LENGTH").and_then(|v| v.parse().ok());
    }

    /// Merge recognised fields out of a parsed JSON object, ignoring
    /// unrecognised keys. Accepts both `nlu-min-length` (wire form) and
    /// `nlu_min_length` (already-normalised) spellings.
    pub fn merge_json(&mut self, value: Value) -> Result<(), CoreError> {
        let Value::Object(map) = value else {
            return Err(CoreError::Config("config value must be a JSON object".into()));
        };

        let get_str = |key: &str| {
            map.get(key)
                .or_else(|| map.get(&key.replace('_', "-")))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        if let Some(v) = get_str("name") {
            self.name = Some(v);
        }
        if let Some(v) = get_str("alias") {
            self.alias = Some(v);
        }
        if let Some(v) = get_str("log-level") {
            self.log_level = Some(v);
        }
        if let Some(v) = map.get("auto-save").or_else(|| map.get("auto_save")).and_then(Value::as_bool) {
            self.auto_save = Some(v);
        }
        if let Some(v) = get_str("message-adapter") {
            self.message_adapter = Some(v);
        }
        if let Some(v) = get_str("nlu-adapter") {
            self.nlu_adapter = Some(v);
        }
        if let Some(v) = get_str("storage-adapter") {
            self.storage_adapter = Some(v);
        }
        if let Some(v) = get_str("webhook-adapter") {
            self.webhook_adapter = Some(v);
        }
        if let Some(v) = get_str("analytics-adapter") {
            self.analytics_adapter = Some(v);
        }
        if let Some(v) = map
            .get("nlu-min-length")
            .or_else(|| map.get("nlu_min_length"))
            .and_then(Value::as_u64)
        {
            self.nlu_min_length = Some(v as usize);
        }

        Ok(())
    }
}
