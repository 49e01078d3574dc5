//! Runtime key codec
//!
//! Results are indexed per runtime key: the tuple of argument values the
//! autotuner keys on (problem sizes, dtypes, flags). Keys are stored as a
//! parenthesized tuple, `(4096, 'float16', True)`, with a trailing comma for
//! a single element, `(4096,)`.
//!
//! Decoding is lossy: every element comes back as a string, so the original
//! element types cannot be recovered from a stored record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, CodecResult};
use crate::split::{quote, split_fields, unquote};
use crate::{format_bool, FIELD_SEPARATOR};

/// A decoded key: one string per tuple element.
pub type DecodedKey = Vec<String>;

/// One element of a runtime key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyPart {
    Int(i64),
    Bool(bool),
    /// Quoted text
    Str(String),
    /// Unquoted text, e.g. a dtype name such as `torch.float16`
    Symbol(String),
}

impl KeyPart {
    /// The string this element decodes to.
    pub fn to_decoded(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Bool(b) => format_bool(*b).to_string(),
            Self::Str(s) | Self::Symbol(s) => s.clone(),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{}", i),
            Self::Bool(b) => f.write_str(format_bool(*b)),
            Self::Str(s) => f.write_str(&quote(s)),
            Self::Symbol(s) => f.write_str(s),
        }
    }
}

impl From<i64> for KeyPart {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KeyPart {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<bool> for KeyPart {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// The key tuple a result is indexed by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuntimeKey(pub Vec<KeyPart>);

impl RuntimeKey {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Encode to the stored tuple form.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a stored tuple into its element strings.
    ///
    /// Quotes are stripped from quoted elements; everything else is kept
    /// verbatim.
    pub fn decode(s: &str) -> CodecResult<DecodedKey> {
        let inner = s
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| CodecError::MalformedKey(s.to_string()))?;

        let inner = inner.strip_suffix(',').unwrap_or(inner);
        if inner.is_empty() {
            return Ok(Vec::new());
        }

        Ok(split_fields(inner)
            .into_iter()
            .map(|e| unquote(e).unwrap_or_else(|| e.to_string()))
            .collect())
    }

    /// The element strings this key decodes to.
    pub fn to_decoded(&self) -> DecodedKey {
        self.0.iter().map(KeyPart::to_decoded).collect()
    }
}

impl fmt::Display for RuntimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        if parts.len() == 1 {
            write!(f, "({},)", parts[0])
        } else {
            write!(f, "({})", parts.join(FIELD_SEPARATOR))
        }
    }
}

impl<T: Into<KeyPart>> FromIterator<T> for RuntimeKey {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ints() {
        let key: RuntimeKey = [4, 4].into_iter().collect();
        assert_eq!(key.encode(), "(4, 4)");
    }

    #[test]
    fn test_encode_mixed() {
        let key = RuntimeKey::new(vec![
            KeyPart::Int(4096),
            KeyPart::Str("float16".to_string()),
            KeyPart::Bool(true),
            KeyPart::Symbol("torch.float32".to_string()),
        ]);
        assert_eq!(key.encode(), "(4096, 'float16', True, torch.float32)");
    }

    #[test]
    fn test_encode_single_and_empty() {
        let single: RuntimeKey = [7].into_iter().collect();
        assert_eq!(single.encode(), "(7,)");
        assert_eq!(RuntimeKey::default().encode(), "()");
    }

    #[test]
    fn test_decode_yields_strings() {
        let decoded = RuntimeKey::decode("(4096, 'float16', True)").unwrap();
        assert_eq!(decoded, vec!["4096", "float16", "True"]);
    }

    #[test]
    fn test_decode_single_element_tuple() {
        assert_eq!(RuntimeKey::decode("(7,)").unwrap(), vec!["7"]);
        assert!(RuntimeKey::decode("()").unwrap().is_empty());
    }

    #[test]
    fn test_decode_double_quoted_element() {
        let decoded = RuntimeKey::decode("(\"it's\", 3)").unwrap();
        assert_eq!(decoded, vec!["it's", "3"]);
    }

    #[test]
    fn test_decode_quoted_separator() {
        let key = RuntimeKey::new(vec![KeyPart::Str("a, b".to_string()), KeyPart::Int(1)]);
        assert_eq!(RuntimeKey::decode(&key.encode()).unwrap(), key.to_decoded());
    }

    #[test]
    fn test_decode_rejects_missing_parens() {
        assert!(matches!(
            RuntimeKey::decode("4, 4"),
            Err(CodecError::MalformedKey(_))
        ));
    }

    #[test]
    fn test_decode_matches_to_decoded() {
        let key = RuntimeKey::new(vec![
            KeyPart::Int(-1),
            KeyPart::Bool(false),
            KeyPart::Str("bf16".to_string()),
        ]);
        assert_eq!(RuntimeKey::decode(&key.encode()).unwrap(), key.to_decoded());
    }
}
