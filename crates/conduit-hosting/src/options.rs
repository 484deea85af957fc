//! Startup options.
//!
//! [`StartOptions`] carries the application startup identifier and any
//! hosting-engine-defined settings. Settings may be any JSON/TOML value and
//! are forwarded to the builder as properties without interpretation.
//! Top-level fields the options do not recognize are kept as extensions and
//! forwarded the same way.
//!
//! Options can be written in code or loaded from TOML/JSON text:
//!
//! ```toml
//! app_startup = "orders-api"
//! region = "eu"
//!
//! [settings]
//! "orders.region" = "eu-west-1"
//! "orders.retries" = 3
//! ```

use conduit_middleware::Properties;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while loading options.
#[derive(Error, Debug)]
pub enum OptionsError {
    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parse error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options used to start an application.
///
/// # Example
///
/// ```
/// use conduit_hosting::StartOptions;
/// use serde_json::json;
///
/// let options = StartOptions::new()
///     .with_app_startup("orders-api")
///     .with_setting("orders.region", "eu-west-1")
///     .with_setting("orders.retries", 3);
///
/// assert_eq!(options.app_startup(), Some("orders-api"));
/// assert_eq!(options.setting_str("orders.region"), Some("eu-west-1"));
/// assert_eq!(options.setting("orders.retries"), Some(&json!(3)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartOptions {
    /// Startup identifier. Blank means "derive one".
    pub app_startup: String,

    /// Engine-defined settings passed through as builder properties.
    pub settings: BTreeMap<String, Value>,

    /// Unrecognized top-level fields.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl StartOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads options from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Sets the startup identifier.
    #[must_use]
    pub fn with_app_startup(mut self, app_startup: impl Into<String>) -> Self {
        self.app_startup = app_startup.into();
        self
    }

    /// Adds an opaque setting.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Returns the startup identifier, or `None` if it is blank.
    #[must_use]
    pub fn app_startup(&self) -> Option<&str> {
        let trimmed = self.app_startup.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Returns a setting value.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.get(key)
    }

    /// Returns a setting value if it is a string.
    #[must_use]
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.setting(key).and_then(Value::as_str)
    }

    /// Returns an unrecognized top-level field.
    #[must_use]
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Renders extensions and settings as builder properties.
    ///
    /// Strings are copied verbatim; any other value becomes its JSON text.
    /// A setting shadows an extension with the same key.
    #[must_use]
    pub fn properties(&self) -> Properties {
        self.extensions
            .iter()
            .chain(&self.settings)
            .map(|(key, value)| (key.clone(), render(value)))
            .collect()
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
