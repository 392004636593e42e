//! Process configuration from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `MCP_BIND_ADDRESS` | `127.0.0.1:8000` | Address the HTTP transport binds |
//! | `MCP_ENDPOINT_PATH` | `/mcp` | Path that accepts JSON-RPC `POST`s |
//! | `MCP_SESSION_BYPASS` | `false` | Admission mode, re-read on every request |
//!
//! The bypass flag is deliberately not captured here: [`Config::mode_switch`]
//! hands back a switch that reads the variable at call time.

use crate::admission::{BYPASS_VARIABLE, ModeSwitch};
use std::env::VarError;

pub const BIND_ADDRESS_VARIABLE: &str = "MCP_BIND_ADDRESS";
pub const ENDPOINT_PATH_VARIABLE: &str = "MCP_ENDPOINT_PATH";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_ENDPOINT_PATH: &str = "/mcp";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{variable} is not valid unicode")]
    NotUnicode { variable: &'static str },
    #[error("{variable} must start with '/', got {value:?}")]
    InvalidPath { variable: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_address: String,
    pub endpoint_path: String,
    /// Variable the admission mode is read from.
    pub bypass_variable: String,
}

impl Config {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name))
    }

    /// Builds a config from an arbitrary variable lookup.
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use std::env::VarError;
    /// use thread_session::config::Config;
    ///
    /// let vars = HashMap::from([("MCP_ENDPOINT_PATH", "/rpc")]);
    /// let config = Config::from_lookup(|name| {
    ///     vars.get(name).map(|v| v.to_string()).ok_or(VarError::NotPresent)
    /// })
    /// .unwrap();
    /// assert_eq!(config.endpoint_path, "/rpc");
    /// assert_eq!(config.bind_address, "127.0.0.1:8000");
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Result<String, VarError>,
    {
        let read = |variable: &'static str, default: &str| match lookup(variable) {
            Ok(value) => Ok(value),
            Err(VarError::NotPresent) => Ok(default.to_string()),
            Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode { variable }),
        };
        let bind_address = read(BIND_ADDRESS_VARIABLE, DEFAULT_BIND_ADDRESS)?;
        let endpoint_path = read(ENDPOINT_PATH_VARIABLE, DEFAULT_ENDPOINT_PATH)?;
        if !endpoint_path.starts_with('/') {
            return Err(ConfigError::InvalidPath {
                variable: ENDPOINT_PATH_VARIABLE,
                value: endpoint_path,
            });
        }
        Ok(Config {
            bind_address,
            endpoint_path,
            bypass_variable: BYPASS_VARIABLE.to_string(),
        })
    }

    pub fn mode_switch(&self) -> ModeSwitch {
        ModeSwitch::Environment {
            variable: self.bypass_variable.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::ffi::OsString;

    fn lookup(vars: &HashMap<&str, &str>) -> impl Fn(&str) -> Result<String, VarError> {
        move |name| vars.get(name).map(|v| v.to_string()).ok_or(VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&HashMap::new())).unwrap();
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.endpoint_path, DEFAULT_ENDPOINT_PATH);
        assert_eq!(config.bypass_variable, "MCP_SESSION_BYPASS");
    }

    #[test]
    fn overrides_are_read() {
        let vars = HashMap::from([
            ("MCP_BIND_ADDRESS", "0.0.0.0:9000"),
            ("MCP_ENDPOINT_PATH", "/"),
        ]);
        let config = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.endpoint_path, "/");
    }

    #[test]
    fn relative_path_is_rejected() {
        let vars = HashMap::from([("MCP_ENDPOINT_PATH", "mcp")]);
        assert_eq!(
            Config::from_lookup(lookup(&vars)),
            Err(ConfigError::InvalidPath {
                variable: "MCP_ENDPOINT_PATH",
                value: "mcp".to_string()
            })
        );
    }

    #[test]
    fn non_unicode_is_reported() {
        let result = Config::from_lookup(|_| Err(VarError::NotUnicode(OsString::from("x"))));
        assert_eq!(
            result,
            Err(ConfigError::NotUnicode {
                variable: "MCP_BIND_ADDRESS"
            })
        );
    }
}
