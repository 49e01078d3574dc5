//! Autotuning configuration codec
//!
//! A [`Config`] is encoded as `field: value` pairs joined by `", "`:
//! keyword arguments first (sorted by name), then the declared fields in a
//! fixed order.
//!
//! ```text
//! BLOCK_M: 64, SPLIT: 'auto', num_warps: 4, num_ctas: 1, num_stages: 3, maxnreg: None, ...
//! ```
//!
//! Decoding parses declared fields by their declared type. Keyword
//! arguments carry no declared type: quoted values are strings, unquoted
//! values are inferred as integer, then boolean, then string (with a
//! warning). Fields in [`SKIPPED_FIELDS`] are dropped on decode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CodecError, CodecResult};
use crate::split::{quote, split_fields, unquote};
use crate::{format_bool, parse_bool, FIELD_SEPARATOR, VALUE_SEPARATOR};

const OPAQUE_FIELD: &str = "pre_hook";

/// Every declared field name.
pub const CONFIG_FIELDS: &[&str] = &[
    "pre_hook",
    "num_warps",
    "num_stages",
    "num_ctas",
    "enable_warp_specialization",
    "maxnreg",
];

/// Fields that are encoded but intentionally discarded on decode.
pub const SKIPPED_FIELDS: &[&str] = &["enable_persistent"];

const NONE_LITERAL: &str = "None";

/// A keyword argument value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KwargValue {
    Int(i64),
    Bool(bool),
    Str(String),
}

impl KwargValue {
    /// Decode an encoded keyword argument value.
    ///
    /// Quoted text is a string. Unquoted text is inferred: integer first,
    /// then boolean, falling back to string.
    pub fn decode(name: &str, raw: &str) -> Self {
        if let Some(s) = unquote(raw) {
            return Self::Str(s);
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Some(b) = parse_bool(raw) {
            return Self::Bool(b);
        }
        warn!(kwarg = name, value = raw, "can't determine type of kwarg, keeping it as string");
        Self::Str(raw.to_string())
    }
}

impl fmt::Display for KwargValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => f.write_str(format_bool(*b)),
            Self::Str(s) => f.write_str(&quote(s)),
        }
    }
}

impl From<i64> for KwargValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KwargValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for KwargValue {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<bool> for KwargValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for KwargValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for KwargValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// An autotuning launch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Config {
    /// Free-form keyword arguments (kernel meta-parameters)
    pub kwargs: BTreeMap<String, KwargValue>,
    pub num_warps: u32,
    pub num_stages: u32,
    pub num_ctas: u32,
    pub enable_warp_specialization: bool,
    /// Register cap; `None` leaves it to the compiler
    pub maxnreg: Option<u32>,
    /// Name of the pre-launch hook, if any
    pub pre_hook: Option<String>,
    /// Not preserved by decoding, see [`SKIPPED_FIELDS`]
    pub enable_persistent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kwargs: BTreeMap::new(),
            num_warps: 4,
            num_stages: 3,
            num_ctas: 1,
            enable_warp_specialization: false,
            maxnreg: None,
            pre_hook: None,
            enable_persistent: false,
        }
    }
}

impl Config {
    /// Create a configuration with default launch fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a keyword argument.
    pub fn with_kwarg(mut self, name: &str, value: impl Into<KwargValue>) -> Self {
        self.kwargs.insert(name.to_string(), value.into());
        self
    }

    pub fn with_num_warps(mut self, num_warps: u32) -> Self {
        self.num_warps = num_warps;
        self
    }

    pub fn with_num_stages(mut self, num_stages: u32) -> Self {
        self.num_stages = num_stages;
        self
    }

    pub fn with_num_ctas(mut self, num_ctas: u32) -> Self {
        self.num_ctas = num_ctas;
        self
    }

    pub fn with_maxnreg(mut self, maxnreg: Option<u32>) -> Self {
        self.maxnreg = maxnreg;
        self
    }

    pub fn with_pre_hook(mut self, pre_hook: &str) -> Self {
        self.pre_hook = Some(pre_hook.to_string());
        self
    }

    /// Encode to the canonical record string.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a record string.
    ///
    /// Fields missing from the input keep their defaults. Skipped fields
    /// are discarded, so `enable_persistent` always decodes as `false`.
    pub fn decode(s: &str) -> CodecResult<Self> {
        let mut config = Self::default();

        for field in split_fields(s) {
            if field.is_empty() {
                continue;
            }
            let (name, value) = field
                .split_once(VALUE_SEPARATOR)
                .ok_or_else(|| CodecError::MalformedField(field.to_string()))?;

            if SKIPPED_FIELDS.contains(&name) {
                continue;
            }

            match name {
                "num_warps" => config.num_warps = parse_int(name, value)?,
                "num_stages" => config.num_stages = parse_int(name, value)?,
                "num_ctas" => config.num_ctas = parse_int(name, value)?,
                "enable_warp_specialization" => {
                    config.enable_warp_specialization =
                        parse_bool(value).ok_or_else(|| CodecError::InvalidBool {
                            field: name.to_string(),
                            value: value.to_string(),
                        })?;
                }
                "maxnreg" => config.maxnreg = value.parse().ok(),
                OPAQUE_FIELD => {
                    config.pre_hook = match value {
                        NONE_LITERAL => None,
                        other => Some(unquote(other).unwrap_or_else(|| other.to_string())),
                    };
                }
                _ => {
                    config
                        .kwargs
                        .insert(name.to_string(), KwargValue::decode(name, value));
                }
            }
        }

        Ok(config)
    }
}

fn parse_int(field: &str, value: &str) -> CodecResult<u32> {
    value.parse().map_err(|_| CodecError::InvalidInt {
        field: field.to_string(),
        value: value.to_string(),
    })
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self
            .kwargs
            .iter()
            .map(|(k, v)| format!("{}{}{}", k, VALUE_SEPARATOR, v))
            .collect();

        parts.push(format!("num_warps: {}", self.num_warps));
        parts.push(format!("num_ctas: {}", self.num_ctas));
        parts.push(format!("num_stages: {}", self.num_stages));
        parts.push(match self.maxnreg {
            Some(n) => format!("maxnreg: {}", n),
            None => format!("maxnreg: {}", NONE_LITERAL),
        });
        parts.push(format!(
            "enable_warp_specialization: {}",
            format_bool(self.enable_warp_specialization)
        ));
        parts.push(format!(
            "enable_persistent: {}",
            format_bool(self.enable_persistent)
        ));
        parts.push(match &self.pre_hook {
            Some(hook) => format!("pre_hook: {}", quote(hook)),
            None => format!("pre_hook: {}", NONE_LITERAL),
        });

        f.write_str(&parts.join(FIELD_SEPARATOR))
    }
}

impl FromStr for Config {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
