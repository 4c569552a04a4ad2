//! Regular-expression substitution over text and bytes.

use regex::Regex;
use regex::bytes::Regex as BytesRegex;

use crate::error::Result;

/// A compiled substitution pattern.
///
/// The same expression is compiled twice so that header values (text) and
/// bodies (arbitrary bytes) can both be rewritten. Replacement strings use
/// the `regex` crate syntax: `$1`, `${name}`, `$$` for a literal dollar.
#[derive(Debug, Clone)]
pub struct Pattern {
    text: Regex,
    bytes: BytesRegex,
}

impl Pattern {
    pub fn new(expr: &str) -> Result<Self> {
        Ok(Self {
            text: Regex::new(expr)?,
            bytes: BytesRegex::new(expr)?,
        })
    }

    /// Build a pattern that matches `literal` verbatim.
    pub fn literal(literal: &str) -> Result<Self> {
        Self::new(&regex::escape(literal))
    }

    pub fn as_str(&self) -> &str {
        self.text.as_str()
    }

    /// Substitute every match in `haystack`, returning the result and the
    /// number of substitutions made.
    pub fn replace_str(&self, haystack: &str, replacement: &str) -> (String, usize) {
        let count = self.text.find_iter(haystack).count();
        if count == 0 {
            return (haystack.to_string(), 0);
        }
        (
            self.text.replace_all(haystack, replacement).into_owned(),
            count,
        )
    }

    /// Byte-oriented counterpart of [`replace_str`](Self::replace_str).
    pub fn replace_bytes(&self, haystack: &[u8], replacement: &str) -> (Vec<u8>, usize) {
        let count = self.bytes.find_iter(haystack).count();
        if count == 0 {
            return (haystack.to_vec(), 0);
        }
        (
            self.bytes
                .replace_all(haystack, replacement.as_bytes())
                .into_owned(),
            count,
        )
    }
}

impl std::str::FromStr for Pattern {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_str_counts_matches() {
        let pattern = Pattern::new("o").unwrap();
        assert_eq!(
            pattern.replace_str("foo boo", "0"),
            ("f00 b00".to_string(), 4)
        );
    }

    #[test]
    fn test_replace_str_no_match() {
        let pattern = Pattern::new("zzz").unwrap();
        assert_eq!(pattern.replace_str("abc", "x"), ("abc".to_string(), 0));
    }

    #[test]
    fn test_replace_with_capture_groups() {
        let pattern = Pattern::new(r"(\w+)@example\.com").unwrap();
        let (out, count) = pattern.replace_str("mail alice@example.com", "$1@example.org");
        assert_eq!(out, "mail alice@example.org");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_replace_bytes_non_utf8() {
        let pattern = Pattern::new("bar").unwrap();
        let (out, count) = pattern.replace_bytes(b"\xff bar \xfe", "baz");
        assert_eq!(out, b"\xff baz \xfe".to_vec());
        assert_eq!(count, 1);
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let pattern = Pattern::literal("a.b").unwrap();
        assert_eq!(pattern.replace_str("a.b axb", "-").1, 1);
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(Pattern::new("(unclosed").is_err());
    }
}
