//! Typed per-script configuration.
//!
//! The schema fixes each field's type through its default value. Overrides and edits are
//! checked against that type: an override value of the wrong type or an unknown key is
//! dropped with a warning, and a typed edit that does not parse leaves the previous value in
//! place and reports a `ConfigEditError`.

use serde_json::{Map as JsonMap, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

pub const RELOAD_SCRIPTS_AFTER_RUN: &str = "reloadScriptsAfterRun";
pub const UPDATE_SELECTED_SCRIPT_ACCESS_TIME: &str = "updateSelectedScriptAccessTime";
pub const HOTKEY: &str = "hotkey";
pub const CLOSE_ON_EXIT: &str = "closeOnExit";
pub const ARGS: &str = "args";
pub const INTERPRETER: &str = "interpreter";
pub const RUN_AT_STARTUP: &str = "runAtStartup";
pub const RUN_EVERY: &str = "runEvery";
pub const RUN_AT: &str = "runAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    Str,
    Int,
    Float,
    Bool,
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigKind::Str => "string",
            ConfigKind::Int => "integer",
            ConfigKind::Float => "float",
            ConfigKind::Bool => "boolean",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ConfigValue {
    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigValue::Str(_) => ConfigKind::Str,
            ConfigValue::Int(_) => ConfigKind::Int,
            ConfigValue::Float(_) => ConfigKind::Float,
            ConfigValue::Bool(_) => ConfigKind::Bool,
        }
    }

    /// Convert a JSON value into the given kind. Integers are accepted for float fields.
    pub fn from_json(kind: ConfigKind, v: &JsonValue) -> Option<Self> {
        match kind {
            ConfigKind::Str => v.as_str().map(|s| ConfigValue::Str(s.to_string())),
            ConfigKind::Int => v.as_i64().map(ConfigValue::Int),
            ConfigKind::Float => v.as_f64().map(ConfigValue::Float),
            ConfigKind::Bool => v.as_bool().map(ConfigValue::Bool),
        }
    }

    pub fn from_toml(kind: ConfigKind, v: &toml::Value) -> Option<Self> {
        match (kind, v) {
            (ConfigKind::Str, toml::Value::String(s)) => Some(ConfigValue::Str(s.clone())),
            (ConfigKind::Int, toml::Value::Integer(i)) => Some(ConfigValue::Int(*i)),
            (ConfigKind::Float, toml::Value::Float(x)) => Some(ConfigValue::Float(*x)),
            (ConfigKind::Float, toml::Value::Integer(i)) => Some(ConfigValue::Float(*i as f64)),
            (ConfigKind::Bool, toml::Value::Boolean(b)) => Some(ConfigValue::Bool(*b)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ConfigValue::Str(s) => JsonValue::String(s.clone()),
            ConfigValue::Int(i) => JsonValue::from(*i),
            ConfigValue::Float(x) => JsonValue::from(*x),
            ConfigValue::Bool(b) => JsonValue::Bool(*b),
        }
    }

    /// Parse user-typed text as `kind`.
    pub fn parse(kind: ConfigKind, text: &str) -> Option<Self> {
        let t = text.trim();
        match kind {
            ConfigKind::Str => Some(ConfigValue::Str(text.to_string())),
            ConfigKind::Int => t.parse().ok().map(ConfigValue::Int),
            ConfigKind::Float => t.parse().ok().map(ConfigValue::Float),
            ConfigKind::Bool => match t.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(ConfigValue::Bool(true)),
                "false" | "0" | "no" | "off" => Some(ConfigValue::Bool(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Str(s) => f.write_str(s),
            ConfigValue::Int(i) => write!(f, "{i}"),
            ConfigValue::Float(x) => write!(f, "{x}"),
            ConfigValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigEditError {
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("`{text}` is not a valid {kind} for `{key}`")]
    InvalidValue {
        key: String,
        kind: ConfigKind,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub key: &'static str,
    pub default: ConfigValue,
}

/// Ordered list of fields with their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSchema {
    fields: Vec<FieldDef>,
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ConfigSchema {
    pub fn builtin() -> Self {
        let f = |key, default| FieldDef { key, default };
        Self {
            fields: vec![
                f(RELOAD_SCRIPTS_AFTER_RUN, ConfigValue::Bool(false)),
                f(UPDATE_SELECTED_SCRIPT_ACCESS_TIME, ConfigValue::Bool(false)),
                f(HOTKEY, ConfigValue::Str(String::new())),
                f(CLOSE_ON_EXIT, ConfigValue::Bool(true)),
                f(ARGS, ConfigValue::Str(String::new())),
                f(INTERPRETER, ConfigValue::Str(String::new())),
                f(RUN_AT_STARTUP, ConfigValue::Bool(false)),
                f(RUN_EVERY, ConfigValue::Int(0)),
                f(RUN_AT, ConfigValue::Str(String::new())),
            ],
        }
    }

    /// Built-in schema with defaults replaced from an application-level table. Values of the
    /// wrong type and unknown keys are ignored with a warning.
    pub fn with_defaults(table: &toml::Table) -> Self {
        let mut schema = Self::builtin();
        for (key, value) in table {
            let Some(field) = schema.fields.iter_mut().find(|f| f.key == key) else {
                warn!(target: "config", key = %key, "script_default_unknown_key");
                continue;
            };
            match ConfigValue::from_toml(field.default.kind(), value) {
                Some(v) => field.default = v,
                None => warn!(
                    target: "config",
                    key = %key,
                    expected = %field.default.kind(),
                    "script_default_type_mismatch"
                ),
            }
        }
        schema
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    pub fn defaults(self: &Arc<Self>) -> ScriptConfig {
        ScriptConfig {
            schema: Arc::clone(self),
            values: self.fields.iter().map(|f| f.default.clone()).collect(),
        }
    }

    /// Merge an override object over the defaults. Returns the merged config and the keys
    /// that were dropped (unknown or mistyped).
    pub fn merge(self: &Arc<Self>, overrides: &JsonMap<String, JsonValue>) -> (ScriptConfig, Vec<String>) {
        let mut cfg = self.defaults();
        let mut dropped = Vec::new();
        for (key, value) in overrides {
            let Some(idx) = self.position(key) else {
                dropped.push(key.clone());
                continue;
            };
            match ConfigValue::from_json(self.fields[idx].default.kind(), value) {
                Some(v) => cfg.values[idx] = v,
                None => dropped.push(key.clone()),
            }
        }
        (cfg, dropped)
    }
}

/// Merged configuration of one script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptConfig {
    schema: Arc<ConfigSchema>,
    values: Vec<ConfigValue>,
}

impl ScriptConfig {
    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.schema.position(key).map(|i| &self.values[i])
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ConfigValue::Bool(true)))
    }

    pub fn get_int(&self, key: &str) -> i64 {
        match self.get(key) {
            Some(ConfigValue::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn get_str(&self, key: &str) -> &str {
        match self.get(key) {
            Some(ConfigValue::Str(s)) => s,
            _ => "",
        }
    }

    /// `(key, value, is_default)` in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ConfigValue, bool)> {
        self.schema
            .fields
            .iter()
            .zip(&self.values)
            .map(|(f, v)| (f.key, v, *v == f.default))
    }

    /// Entries that differ from the schema defaults.
    pub fn non_defaults(&self) -> impl Iterator<Item = (&'static str, &ConfigValue)> {
        self.iter().filter(|(_, _, d)| !d).map(|(k, v, _)| (k, v))
    }

    /// Override object holding only non-default values.
    pub fn to_overrides(&self) -> JsonMap<String, JsonValue> {
        self.non_defaults()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect()
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigEditError> {
        let idx = self
            .schema
            .position(key)
            .ok_or_else(|| ConfigEditError::UnknownKey(key.to_string()))?;
        let kind = self.schema.fields[idx].default.kind();
        if value.kind() != kind {
            return Err(ConfigEditError::InvalidValue {
                key: key.to_string(),
                kind,
                text: value.to_string(),
            });
        }
        self.values[idx] = value;
        Ok(())
    }

    /// Parse `text` by the field's declared type and store it.
    pub fn set_from_text(&mut self, key: &str, text: &str) -> Result<(), ConfigEditError> {
        let kind = self
            .schema
            .field(key)
            .ok_or_else(|| ConfigEditError::UnknownKey(key.to_string()))?
            .default
            .kind();
        let value = ConfigValue::parse(kind, text).ok_or_else(|| ConfigEditError::InvalidValue {
            key: key.to_string(),
            kind,
            text: text.to_string(),
        })?;
        self.set(key, value)
    }

    pub fn reload_scripts_after_run(&self) -> bool {
        self.get_bool(RELOAD_SCRIPTS_AFTER_RUN)
    }

    pub fn update_selected_script_access_time(&self) -> bool {
        self.get_bool(UPDATE_SELECTED_SCRIPT_ACCESS_TIME)
    }

    pub fn hotkey(&self) -> &str {
        self.get_str(HOTKEY)
    }

    pub fn close_on_exit(&self) -> bool {
        self.get_bool(CLOSE_ON_EXIT)
    }

    pub fn args(&self) -> &str {
        self.get_str(ARGS)
    }

    pub fn interpreter(&self) -> &str {
        self.get_str(INTERPRETER)
    }

    pub fn run_at_startup(&self) -> bool {
        self.get_bool(RUN_AT_STARTUP)
    }

    pub fn run_every_secs(&self) -> i64 {
        self.get_int(RUN_EVERY)
    }

    pub fn run_at(&self) -> &str {
        self.get_str(RUN_AT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Arc<ConfigSchema> {
        Arc::new(ConfigSchema::builtin())
    }

    fn obj(v: JsonValue) -> JsonMap<String, JsonValue> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_applies_known_keys_and_drops_others() {
        let (cfg, dropped) = schema().merge(&obj(json!({
            "reloadScriptsAfterRun": true,
            "runEvery": 30,
            "colour": "blue",
            "closeOnExit": "nope"
        })));
        assert!(cfg.reload_scripts_after_run());
        assert_eq!(cfg.run_every_secs(), 30);
        assert!(cfg.close_on_exit(), "mistyped value falls back to default");
        let mut dropped = dropped;
        dropped.sort();
        assert_eq!(dropped, vec!["closeOnExit".to_string(), "colour".to_string()]);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let (cfg, dropped) = schema().merge(&JsonMap::new());
        assert!(dropped.is_empty());
        assert_eq!(cfg, schema().defaults());
        assert_eq!(cfg.non_defaults().count(), 0);
    }

    #[test]
    fn set_from_text_dispatches_on_declared_type() {
        let mut cfg = schema().defaults();
        cfg.set_from_text(RUN_EVERY, " 15 ").unwrap();
        assert_eq!(cfg.run_every_secs(), 15);

        let err = cfg.set_from_text(RUN_EVERY, "soon").unwrap_err();
        assert!(matches!(err, ConfigEditError::InvalidValue { kind: ConfigKind::Int, .. }));
        assert_eq!(cfg.run_every_secs(), 15, "prior value intact");

        cfg.set_from_text(CLOSE_ON_EXIT, "0").unwrap();
        assert!(!cfg.close_on_exit());
        assert!(cfg.set_from_text(CLOSE_ON_EXIT, "maybe").is_err());

        // Text fields keep the text verbatim even when it looks numeric.
        cfg.set_from_text(ARGS, "1").unwrap();
        assert_eq!(cfg.args(), "1");

        assert_eq!(
            cfg.set_from_text("bogus", "1"),
            Err(ConfigEditError::UnknownKey("bogus".into()))
        );
    }

    #[test]
    fn overrides_hold_only_non_defaults() {
        let mut cfg = schema().defaults();
        cfg.set(HOTKEY, ConfigValue::Str("ctrl+k".into())).unwrap();
        cfg.set(CLOSE_ON_EXIT, ConfigValue::Bool(true)).unwrap();
        assert_eq!(JsonValue::Object(cfg.to_overrides()), json!({"hotkey": "ctrl+k"}));
        let flagged: Vec<_> = cfg.iter().filter(|(_, _, d)| !d).map(|(k, _, _)| k).collect();
        assert_eq!(flagged, vec![HOTKEY]);
    }

    #[test]
    fn set_rejects_wrong_kind() {
        let mut cfg = schema().defaults();
        assert!(cfg.set(RUN_EVERY, ConfigValue::Str("x".into())).is_err());
        assert_eq!(cfg.run_every_secs(), 0);
    }

    #[test]
    fn app_level_defaults_respect_types() {
        let table: toml::Table = toml::from_str(
            "closeOnExit = false\nrunEvery = \"often\"\nunknown = 1\n",
        )
        .unwrap();
        let schema = Arc::new(ConfigSchema::with_defaults(&table));
        let cfg = schema.defaults();
        assert!(!cfg.close_on_exit());
        assert_eq!(cfg.run_every_secs(), 0);
    }

    #[test]
    fn float_fields_accept_integers() {
        assert_eq!(
            ConfigValue::from_json(ConfigKind::Float, &json!(2)),
            Some(ConfigValue::Float(2.0))
        );
        assert_eq!(ConfigValue::from_json(ConfigKind::Int, &json!(2.5)), None);
    }
}
