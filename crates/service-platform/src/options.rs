use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

// Option names recognized by the service families.
pub const USER_SERVICE: &str = "UserService";
pub const KEEP_ALIVE: &str = "KeepAlive";
pub const RUN_AT_LOAD: &str = "RunAtLoad";
pub const SESSION_CREATE: &str = "SessionCreate";
pub const RESTART: &str = "Restart";
pub const START_TYPE: &str = "StartType";
pub const RUN_WAIT: &str = "RunWait";

pub const LAUNCHD_CONFIG: &str = "LaunchdConfig";
pub const SYSTEMD_SCRIPT: &str = "SystemdScript";
pub const SYSV_SCRIPT: &str = "SysvScript";
pub const RC_SCRIPT: &str = "RcScript";
pub const WINDOWS_BIN_PATH: &str = "WindowsBinPath";

pub const USER_SERVICE_DEFAULT: bool = false;
pub const KEEP_ALIVE_DEFAULT: bool = true;
pub const RUN_AT_LOAD_DEFAULT: bool = false;
pub const SESSION_CREATE_DEFAULT: bool = false;
pub const RESTART_DEFAULT: &str = "always";
pub const START_TYPE_DEFAULT: &str = "automatic";

/// Replacement for the default "wait for a termination signal" step of `run`.
pub type WaitFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Wait(WaitFn),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "a boolean",
            OptionValue::Int(_) => "an integer",
            OptionValue::Str(_) => "a string",
            OptionValue::Wait(_) => "a wait function",
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(v) => write!(f, "Bool({})", v),
            OptionValue::Int(v) => write!(f, "Int({})", v),
            OptionValue::Str(v) => write!(f, "Str({:?})", v),
            OptionValue::Wait(_) => f.write_str("Wait(..)"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

/// Scalar shapes accepted from a config file.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Open-ended option map that tunes family-specific behavior.
#[derive(Debug, Clone, Default)]
pub struct Options(BTreeMap<String, OptionValue>);

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = BTreeMap::<String, Scalar>::deserialize(deserializer)?;
        let values = map
            .into_iter()
            .map(|(k, v)| {
                let v = match v {
                    Scalar::Bool(b) => OptionValue::Bool(b),
                    Scalar::Int(i) => OptionValue::Int(i),
                    Scalar::Str(s) => OptionValue::Str(s),
                };
                (k, v)
            })
            .collect();
        Ok(Options(values))
    }
}

#[derive(Clone, Copy)]
enum Kind {
    Bool,
    Str,
    Wait,
}

const KNOWN: &[(&str, Kind)] = &[
    (USER_SERVICE, Kind::Bool),
    (KEEP_ALIVE, Kind::Bool),
    (RUN_AT_LOAD, Kind::Bool),
    (SESSION_CREATE, Kind::Bool),
    (RESTART, Kind::Str),
    (START_TYPE, Kind::Str),
    (RUN_WAIT, Kind::Wait),
    (LAUNCHD_CONFIG, Kind::Str),
    (SYSTEMD_SCRIPT, Kind::Str),
    (SYSV_SCRIPT, Kind::Str),
    (RC_SCRIPT, Kind::Str),
    (WINDOWS_BIN_PATH, Kind::Str),
];

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> &mut Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Installs a custom wait used by `run` instead of the signal wait.
    pub fn with_run_wait<F>(mut self, wait: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.0.insert(RUN_WAIT.to_string(), OptionValue::Wait(Arc::new(wait)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.0.get(name) {
            Some(OptionValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn int(&self, name: &str, default: i64) -> i64 {
        match self.0.get(name) {
            Some(OptionValue::Int(v)) => *v,
            _ => default,
        }
    }

    pub fn string(&self, name: &str, default: &str) -> String {
        match self.0.get(name) {
            Some(OptionValue::Str(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    pub fn wait(&self, name: &str) -> Option<WaitFn> {
        match self.0.get(name) {
            Some(OptionValue::Wait(f)) => Some(Arc::clone(f)),
            _ => None,
        }
    }

    /// Checks that every recognized option holds the type its readers expect.
    /// Unrecognized names are left alone for custom templates.
    pub fn validate(&self) -> Result<()> {
        for (name, kind) in KNOWN {
            let Some(value) = self.0.get(*name) else {
                continue;
            };
            let ok = matches!(
                (kind, value),
                (Kind::Bool, OptionValue::Bool(_))
                    | (Kind::Str, OptionValue::Str(_))
                    | (Kind::Wait, OptionValue::Wait(_))
            );
            if !ok {
                let expected = match kind {
                    Kind::Bool => "a boolean",
                    Kind::Str => "a string",
                    Kind::Wait => "a wait function",
                };
                tracing::debug!("option {} holds {}, expected {}", name, value.kind(), expected);
                return Err(Error::InvalidOption {
                    name: name.to_string(),
                    expected,
                });
            }
        }
        Ok(())
    }
}
