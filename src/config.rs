use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SqlScopeError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3306;

/// Driver options, seeded with the recognized defaults.
///
/// Caller overrides are merged over the defaults rather than replacing them, so
/// a config that only sets `autocommit` still carries the charset settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, JsonValue>", into = "BTreeMap<String, JsonValue>")]
pub struct DriverOptions(BTreeMap<String, JsonValue>);

impl Default for DriverOptions {
    fn default() -> Self {
        let mut map = BTreeMap::new();
        map.insert("use_unicode".to_string(), JsonValue::Bool(true));
        map.insert("charset".to_string(), JsonValue::from("utf8"));
        map.insert("collation".to_string(), JsonValue::from("utf8_general_ci"));
        map.insert("autocommit".to_string(), JsonValue::Bool(false));
        Self(map)
    }
}

impl From<BTreeMap<String, JsonValue>> for DriverOptions {
    fn from(overrides: BTreeMap<String, JsonValue>) -> Self {
        let mut options = DriverOptions::default();
        options.merge(overrides);
        options
    }
}

impl From<DriverOptions> for BTreeMap<String, JsonValue> {
    fn from(options: DriverOptions) -> Self {
        options.0
    }
}

impl DriverOptions {
    /// Merge `overrides` over the current values.
    pub fn merge(&mut self, overrides: impl IntoIterator<Item = (String, JsonValue)>) {
        self.0.extend(overrides);
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    /// Whether the driver commits after every statement on its own.
    #[must_use]
    pub fn autocommit(&self) -> bool {
        self.0
            .get("autocommit")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.0.get("charset").and_then(JsonValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.0.iter()
    }
}

/// Parameters needed to open a physical connection.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub options: DriverOptions,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("options", &self.options)
            .finish()
    }
}

impl ConnectOptions {
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            database: database.into(),
            host: default_host(),
            port: default_port(),
            options: DriverOptions::default(),
        }
    }

    #[must_use]
    pub fn builder(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> ConnectOptionsBuilder {
        ConnectOptionsBuilder::new(user, password, database)
    }

    /// Options for a file-backed driver where only `database` (the path) matters.
    #[must_use]
    pub fn for_path(path: impl Into<String>) -> Self {
        Self::new("", "", path)
    }

    /// Parse options from JSON; omitted fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ConfigError` if the JSON does not describe valid options.
    pub fn from_json(json: &str) -> Result<Self, SqlScopeError> {
        serde_json::from_str(json)
            .map_err(|e| SqlScopeError::ConfigError(format!("invalid connect options: {e}")))
    }

    /// `user@host:port/database`, used in logs and connection errors.
    #[must_use]
    pub fn target(&self) -> String {
        if self.user.is_empty() {
            format!("{}:{}/{}", self.host, self.port, self.database)
        } else {
            format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
        }
    }
}

/// Fluent builder for [`ConnectOptions`].
#[derive(Debug, Clone)]
pub struct ConnectOptionsBuilder {
    opts: ConnectOptions,
}

impl ConnectOptionsBuilder {
    #[must_use]
    pub fn new(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            opts: ConnectOptions::new(user, password, database),
        }
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.opts.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.opts.port = port;
        self
    }

    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.opts.options = self.opts.options.with_option(key, value);
        self
    }

    #[must_use]
    pub fn options(mut self, overrides: impl IntoIterator<Item = (String, JsonValue)>) -> Self {
        self.opts.options.merge(overrides);
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_conventional_server() {
        let opts = ConnectOptions::new("app", "secret", "shop");
        assert_eq!(opts.host, "127.0.0.1");
        assert_eq!(opts.port, 3306);
        assert!(!opts.options.autocommit());
        assert_eq!(opts.options.charset(), Some("utf8"));
        assert_eq!(
            opts.options.get("collation"),
            Some(&JsonValue::from("utf8_general_ci"))
        );
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let opts = ConnectOptions::builder("app", "secret", "shop")
            .host("db.internal")
            .port(3307)
            .option("autocommit", true)
            .option("connect_timeout", 5)
            .finish();
        assert!(opts.options.autocommit());
        assert_eq!(opts.options.charset(), Some("utf8"));
        assert_eq!(opts.options.get("connect_timeout"), Some(&JsonValue::from(5)));
        assert_eq!(opts.target(), "app@db.internal:3307/shop");
    }

    #[test]
    fn json_fills_in_defaults() -> Result<(), SqlScopeError> {
        let opts = ConnectOptions::from_json(
            r#"{"user":"app","password":"pw","database":"shop","options":{"charset":"utf8mb4"}}"#,
        )?;
        assert_eq!(opts.port, DEFAULT_PORT);
        assert_eq!(opts.options.charset(), Some("utf8mb4"));
        assert_eq!(opts.options.get("use_unicode"), Some(&JsonValue::Bool(true)));
        Ok(())
    }

    #[test]
    fn json_rejects_missing_database() {
        let err = ConnectOptions::from_json(r#"{"user":"app","password":"pw"}"#);
        assert!(matches!(err, Err(SqlScopeError::ConfigError(_))));
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", ConnectOptions::new("app", "hunter2", "shop"));
        assert!(!rendered.contains("hunter2"));
    }
}
