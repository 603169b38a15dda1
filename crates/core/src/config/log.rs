// SPDX-FileCopyrightText: © 2025 VoiceKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Logging configuration contract.
//!
//! This module only models the JSON shape - the platform's logging
//! subsystem consumes the resolved [`LogSinkConfig`] records. Unknown keys
//! are ignored; unset keys inherit: function settings fall back to their
//! module, module settings to the global section.

use crate::json::{self, JsonValue};
use indexmap::IndexMap;
use std::path::PathBuf;

pub const DEFAULT_MESSAGES_PER_FILE: u64 = 100_000;
pub const DEFAULT_KEEP_FILES: u64 = 10;

const KEY_LOGGING: &str = "logging";
const KEY_SYSTEMD: &str = "systemd";
const KEY_FILE: &str = "file";
const KEY_FORMAT: &str = "format";
const KEY_LEVEL: &str = "level";
const KEY_MESSAGES_PER_FILE: &str = "messages_per_file";
const KEY_NUM_FILES: &str = "num_files";
const KEY_CUSTOM: &str = "custom";
const KEY_FUNCTIONS: &str = "functions";

/// Wire format of emitted log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn from_json(value: &JsonValue) -> Option<Self> {
        match json::get(value, "/format").and_then(JsonValue::as_str) {
            Some("json") => Some(Self::Json),
            Some("text") => Some(Self::Text),
            Some(other) => {
                tracing::error!(format = other, "unknown log format, falling back to default");
                None
            },
            None => None,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

/// Severity threshold, syslog-style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl LogLevel {
    pub fn from_str(level: &str) -> Option<Self> {
        match level {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            "alert" => Some(Self::Alert),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

/// Where file output goes. The special path values `stdout` and `stderr`
/// route to the corresponding standard stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogDestination {
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogDestination {
    fn from_path(path: &str) -> Self {
        match path {
            "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            other => Self::File(PathBuf::from(other)),
        }
    }

    fn as_json(&self) -> JsonValue {
        match self {
            Self::Stdout => JsonValue::string("stdout"),
            Self::Stderr => JsonValue::string("stderr"),
            Self::File(path) => JsonValue::string(path.to_string_lossy()),
        }
    }
}

/// File sink with rotation bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileConfig {
    pub destination: LogDestination,
    pub messages_per_file: u64,
    pub num_files: u64,
}

impl LogFileConfig {
    fn from_json(section: &JsonValue) -> Option<Self> {
        let file = json::get(section, "/file")?;

        // Both `"file": "path"` and `"file": {"file": "path", ...}` are
        // accepted.
        let (path, rotation) = if file.is_object() {
            (json::get(file, "/file").and_then(JsonValue::as_str)?, file)
        } else {
            (file.as_str()?, section)
        };

        let number_or = |key: &str, fallback: u64| -> u64 {
            match json::get(rotation, key) {
                Some(JsonValue::Number(n)) if *n > 0.0 => {
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let n = *n as u64;
                    n
                },
                Some(JsonValue::Number(_)) | None => fallback,
                Some(_) => {
                    tracing::error!(key, "log rotation setting is not a number");
                    fallback
                },
            }
        };

        Some(Self {
            destination: LogDestination::from_path(path),
            messages_per_file: number_or("/messages_per_file", DEFAULT_MESSAGES_PER_FILE),
            num_files: number_or("/num_files", DEFAULT_KEEP_FILES),
        })
    }

    fn to_json(&self) -> JsonValue {
        let mut out = JsonValue::object();
        let _ = out.object_set(KEY_FILE, self.destination.as_json());
        #[allow(clippy::cast_precision_loss)]
        {
            let _ = out
                .object_set(KEY_MESSAGES_PER_FILE, JsonValue::number(self.messages_per_file as f64));
            let _ = out.object_set(KEY_NUM_FILES, JsonValue::number(self.num_files as f64));
        }
        out
    }
}

/// One sink description. Unset fields inherit from the enclosing scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogSinkConfig {
    pub systemd: Option<bool>,
    pub file: Option<LogFileConfig>,
    pub format: Option<LogFormat>,
    pub level: Option<LogLevel>,
}

impl LogSinkConfig {
    fn from_json(section: &JsonValue) -> Self {
        let systemd = json::get(section, "/systemd").and_then(JsonValue::as_bool);
        let file = LogFileConfig::from_json(section);
        let format = LogFormat::from_json(section);
        let level = json::get(section, "/level")
            .and_then(JsonValue::as_str)
            .and_then(LogLevel::from_str);

        Self { systemd, file, format, level }
    }

    fn to_json(&self) -> JsonValue {
        let mut out = JsonValue::object();
        if let Some(systemd) = self.systemd {
            let _ = out.object_set(KEY_SYSTEMD, JsonValue::boolean(systemd));
        }
        if let Some(file) = &self.file {
            let _ = out.object_set(KEY_FILE, file.to_json());
        }
        if let Some(format) = self.format {
            let _ = out.object_set(KEY_FORMAT, JsonValue::string(format.as_str()));
        }
        if let Some(level) = self.level {
            let _ = out.object_set(KEY_LEVEL, JsonValue::string(level.as_str()));
        }
        out
    }

    /// Fills unset fields of `self` from `base`.
    fn inherit(&self, base: &Self) -> Self {
        Self {
            systemd: self.systemd.or(base.systemd),
            file: self.file.clone().or_else(|| base.file.clone()),
            format: self.format.or(base.format),
            level: self.level.or(base.level),
        }
    }
}

/// Per-module settings plus per-function overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogModuleConfig {
    pub sink: LogSinkConfig,
    pub functions: IndexMap<String, LogSinkConfig>,
}

/// The full logging configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogConfig {
    pub global: LogSinkConfig,
    pub modules: IndexMap<String, LogModuleConfig>,
}

impl LogConfig {
    /// Reads the configuration from `json`. A `"logging"` wrapper object is
    /// accepted but not required.
    pub fn from_json(json: &JsonValue) -> Self {
        let section = json::get(json, "/logging").unwrap_or(json);

        let global = LogSinkConfig::from_json(section);
        let mut modules = IndexMap::new();

        if let Some(custom) = json::get(section, "/custom") {
            custom.for_each_entry(|module, module_json| {
                let mut config =
                    LogModuleConfig { sink: LogSinkConfig::from_json(module_json), ..Default::default() };

                if let Some(functions) = json::get(module_json, "/functions") {
                    functions.for_each_entry(|function, function_json| {
                        config
                            .functions
                            .insert(function.to_string(), LogSinkConfig::from_json(function_json));
                        true
                    });
                }

                modules.insert(module.to_string(), config);
                true
            });
        }

        Self { global, modules }
    }

    /// Serializes back to the canonical shape (under a `"logging"` wrapper).
    pub fn to_json(&self) -> JsonValue {
        let mut section = self.global.to_json();

        if !self.modules.is_empty() {
            let mut custom = JsonValue::object();
            for (module, config) in &self.modules {
                let mut module_json = config.sink.to_json();
                if !config.functions.is_empty() {
                    let mut functions = JsonValue::object();
                    for (function, sink) in &config.functions {
                        let _ = functions.object_set(function.clone(), sink.to_json());
                    }
                    let _ = module_json.object_set(KEY_FUNCTIONS, functions);
                }
                let _ = custom.object_set(module.clone(), module_json);
            }
            let _ = section.object_set(KEY_CUSTOM, custom);
        }

        let mut out = JsonValue::object();
        let _ = out.object_set(KEY_LOGGING, section);
        out
    }

    /// The settings effective for `module` / `function`, with unset fields
    /// inherited from the enclosing scopes.
    pub fn effective(&self, module: Option<&str>, function: Option<&str>) -> LogSinkConfig {
        let Some(module) = module else {
            return self.global.clone();
        };
        let Some(module_config) = self.modules.get(module) else {
            return self.global.clone();
        };

        let module_sink = module_config.sink.inherit(&self.global);

        match function.and_then(|f| module_config.functions.get(f)) {
            Some(function_sink) => function_sink.inherit(&module_sink),
            None => module_sink,
        }
    }
}
