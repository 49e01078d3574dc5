//! Quote-aware splitting shared by both codecs.
//!
//! A quote only opens at the start of a value: at offset 0, or right after
//! a `", "` or `": "` separator. Quotes anywhere else are literal text, so
//! legacy unquoted values containing apostrophes still split correctly. A
//! quote that never closes is treated as literal text as well.

use tracing::warn;

/// Split `s` on `", "`, ignoring separators inside quoted values.
pub(crate) fn split_fields(s: &str) -> Vec<&str> {
    let mut literal_quotes = Vec::new();
    loop {
        match scan(s, &literal_quotes) {
            Ok(fields) => return fields,
            Err(open) => {
                warn!(input = s, offset = open, "unterminated quote, treating it as text");
                literal_quotes.push(open);
            }
        }
    }
}

/// One splitting pass. Quotes at `literal_quotes` offsets never open.
/// Returns the offset of an unterminated opening quote on failure.
fn scan<'a>(s: &'a str, literal_quotes: &[usize]) -> Result<Vec<&'a str>, usize> {
    let bytes = s.as_bytes();
    let mut fields = Vec::new();
    let mut start = 0;
    let mut open: Option<(u8, usize)> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match open {
            Some((q, _)) => {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == q {
                    open = None;
                }
            }
            None => {
                if (b == b'\'' || b == b'"')
                    && at_value_start(bytes, i)
                    && !literal_quotes.contains(&i)
                {
                    open = Some((b, i));
                } else if b == b',' && bytes.get(i + 1) == Some(&b' ') {
                    fields.push(&s[start..i]);
                    start = i + 2;
                    i += 2;
                    continue;
                }
            }
        }
        i += 1;
    }

    if let Some((_, offset)) = open {
        return Err(offset);
    }
    fields.push(&s[start..]);
    Ok(fields)
}

fn at_value_start(bytes: &[u8], i: usize) -> bool {
    i == 0 || (i >= 2 && matches!(&bytes[i - 2..i], b", " | b": "))
}

/// Quote a string value with single quotes, backslash-escaping `\` and `'`.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\\' || c == '\'' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Strip matching quotes and resolve escapes; `None` if `s` is not a single
/// quoted value, i.e. its first unescaped closing quote is not the last char.
pub(crate) fn unquote(s: &str) -> Option<String> {
    let first = s.chars().next()?;
    if first != '\'' && first != '"' {
        return None;
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s[1..].char_indices();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, next)) => out.push(next),
                None => return None,
            }
        } else if c == first {
            return (1 + i + c.len_utf8() == s.len()).then_some(out);
        } else {
            out.push(c);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain() {
        assert_eq!(
            split_fields("a: 1, b: 2"),
            vec!["a: 1", "b: 2"]
        );
    }

    #[test]
    fn test_split_keeps_separator_inside_quotes() {
        assert_eq!(
            split_fields("name: 'x, y', n: 3"),
            vec!["name: 'x, y'", "n: 3"]
        );
    }

    #[test]
    fn test_split_apostrophe_mid_value_is_literal() {
        assert_eq!(
            split_fields("note: it's, n: 3"),
            vec!["note: it's", "n: 3"]
        );
    }

    #[test]
    fn test_split_unterminated_quote_is_literal() {
        assert_eq!(
            split_fields("name: 'abc, n: 3"),
            vec!["name: 'abc", "n: 3"]
        );
    }

    #[test]
    fn test_split_unterminated_quote_keeps_earlier_quoted_value() {
        assert_eq!(
            split_fields("a: 'x, y', MODE: 'fast, n: 4"),
            vec!["a: 'x, y'", "MODE: 'fast", "n: 4"]
        );
    }

    #[test]
    fn test_unquote_rejects_inner_closing_quote() {
        assert_eq!(unquote("'x' and 'y'"), None);
        assert_eq!(unquote("'fast"), None);
        assert_eq!(unquote(r"'trailing\'"), None);
    }

    #[test]
    fn test_quote_unquote_escapes() {
        let raw = r"it's a \ path";
        let quoted = quote(raw);
        assert_eq!(quoted, r"'it\'s a \\ path'");
        assert_eq!(unquote(&quoted).unwrap(), raw);
    }

    #[test]
    fn test_unquote_double_quotes() {
        assert_eq!(unquote("\"it's\"").unwrap(), "it's");
        assert_eq!(unquote("plain"), None);
        assert_eq!(unquote("'"), None);
    }

    #[test]
    fn test_split_escaped_quote_inside_value() {
        assert_eq!(
            split_fields(r"a: 'x\', y', b: 1"),
            vec![r"a: 'x\', y'", "b: 1"]
        );
    }
}
