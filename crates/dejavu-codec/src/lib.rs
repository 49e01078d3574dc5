//! Dejavu Codec
//!
//! Text codecs for the values stored in a dejavu cache record:
//! - [`Config`]: an autotuning launch configuration, stored as a
//!   comma-separated `field: value` string
//! - [`RuntimeKey`]: the per-shape key tuple, stored as a parenthesized list
//!
//! Both formats stay readable by older records written without type tags.

pub mod config;
pub mod error;
pub mod key;
mod split;

pub use config::{Config, KwargValue, CONFIG_FIELDS, SKIPPED_FIELDS};
pub use error::{CodecError, CodecResult};
pub use key::{DecodedKey, KeyPart, RuntimeKey};

/// Separator between encoded fields and tuple elements.
pub const FIELD_SEPARATOR: &str = ", ";

/// Separator between a field name and its value.
pub const VALUE_SEPARATOR: &str = ": ";

/// Parse a boolean leniently.
///
/// Accepts `y`, `yes`, `t`, `true`, `on`, `1` and `n`, `no`, `f`, `false`,
/// `off`, `0`, case-insensitively.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "t" | "true" | "on" | "1" => Some(true),
        "n" | "no" | "f" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Render a boolean the way stored records spell it.
pub fn format_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_lenient() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("FALSE"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("n"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn test_format_bool_roundtrips() {
        assert_eq!(parse_bool(format_bool(true)), Some(true));
        assert_eq!(parse_bool(format_bool(false)), Some(false));
    }
}
