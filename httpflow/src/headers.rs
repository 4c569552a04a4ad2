//! Ordered, case-insensitive header multimap.

use serde_json::Value;

use crate::error::StateError;
use crate::pattern::Pattern;

/// HTTP header fields in wire order.
///
/// Names compare case-insensitively but keep the case they were received
/// with. Repeated names keep every value, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// First value for `name`.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Mutable access to every value stored under `name`.
    pub fn values_mut<'a>(&'a mut self, name: &'a str) -> impl Iterator<Item = &'a mut String> {
        self.fields
            .iter_mut()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Append a field, keeping any existing values for the name.
    pub fn append<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        self.fields.push((name.into(), value.into()));
    }

    /// Set `name` to exactly one value.
    ///
    /// The first existing field keeps its position (and name case) and takes
    /// the new value; later duplicates are dropped. Absent names are
    /// appended.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, name: K, value: V) {
        let name = name.into();
        let value = value.into();
        match self
            .fields
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            Some(first) => {
                self.fields[first].1 = value;
                let mut index = 0;
                self.fields.retain(|(k, _)| {
                    let keep = index <= first || !k.eq_ignore_ascii_case(&name);
                    index += 1;
                    keep
                });
            }
            None => self.fields.push((name, value)),
        }
    }

    /// Replace every value of `name` with `values`, appended at the end.
    pub fn set_all<K, I, V>(&mut self, name: K, values: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = name.into();
        self.remove(&name);
        for value in values {
            self.fields.push((name.clone(), value.into()));
        }
    }

    /// Remove every field named `name`, returning how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        before - self.fields.len()
    }

    /// Substitute `pattern` in every header value. Names are left alone.
    pub fn replace_values(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        let mut total = 0;
        for (_, value) in self.fields.iter_mut() {
            let (replaced, count) = pattern.replace_str(value, replacement);
            if count > 0 {
                *value = replaced;
                total += count;
            }
        }
        total
    }

    pub(crate) fn to_state(&self) -> Value {
        Value::Array(
            self.fields
                .iter()
                .map(|(k, v)| Value::Array(vec![Value::from(k.as_str()), Value::from(v.as_str())]))
                .collect(),
        )
    }

    pub(crate) fn from_state(field: &'static str, value: &Value) -> Result<Self, StateError> {
        let mismatch = StateError::TypeMismatch {
            field,
            expected: "a list of [name, value] pairs",
        };
        let Some(items) = value.as_array() else {
            return Err(mismatch);
        };
        let mut headers = Headers::new();
        for item in items {
            match item.as_array().map(Vec::as_slice) {
                Some([Value::String(k), Value::String(v)]) => headers.append(k.as_str(), v.as_str()),
                _ => return Err(mismatch),
            }
        }
        Ok(headers)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Headers {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.fields
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

/// Names are taken in `http`'s lowercase form. Values that are not UTF-8
/// are decoded lossily: each invalid sequence becomes U+FFFD, so such a
/// value does not survive a round trip byte for byte.
impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        map.iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_map_replaces_invalid_utf8() {
        let mut map = http::HeaderMap::new();
        map.insert("x-name", http::HeaderValue::from_bytes(b"caf\xe9").unwrap());
        map.append("x-name", http::HeaderValue::from_static("plain"));

        let headers = Headers::from(&map);
        assert_eq!(headers.get_all("X-Name"), vec!["caf\u{fffd}", "plain"]);
    }

    fn sample() -> Headers {
        Headers::from_iter([
            ("Host", "example.com"),
            ("Set-Cookie", "a=1"),
            ("Accept", "*/*"),
            ("set-cookie", "b=2"),
        ])
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let headers = sample();
        assert_eq!(headers.get_first("HOST"), Some("example.com"));
        assert_eq!(headers.get_all("SET-COOKIE"), vec!["a=1", "b=2"]);
        assert!(headers.contains("accept"));
        assert!(!headers.contains("content-type"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut headers = sample();
        headers.insert("SET-COOKIE", "c=3");

        let fields: Vec<_> = headers.iter().collect();
        assert_eq!(
            fields,
            vec![
                ("Host", "example.com"),
                ("Set-Cookie", "c=3"),
                ("Accept", "*/*"),
            ]
        );
    }

    #[test]
    fn test_insert_appends_absent_name() {
        let mut headers = sample();
        headers.insert("Content-Type", "text/html");
        assert_eq!(headers.iter().last(), Some(("Content-Type", "text/html")));
    }

    #[test]
    fn test_set_all_appends_at_end() {
        let mut headers = sample();
        headers.set_all("host", ["a.test", "b.test"]);

        assert_eq!(headers.len(), 5);
        assert_eq!(headers.get_all("Host"), vec!["a.test", "b.test"]);
        assert_eq!(headers.iter().next(), Some(("Set-Cookie", "a=1")));
    }

    #[test]
    fn test_remove_returns_count() {
        let mut headers = sample();
        assert_eq!(headers.remove("set-cookie"), 2);
        assert_eq!(headers.remove("set-cookie"), 0);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_replace_values_leaves_names() {
        let mut headers = Headers::from_iter([("X-Host", "host.test"), ("Host", "host.test")]);
        let pattern = Pattern::new("host").unwrap();

        assert_eq!(headers.replace_values(&pattern, "h"), 2);
        assert_eq!(headers.get_first("x-host"), Some("h.test"));
        assert_eq!(headers.get_first("host"), Some("h.test"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.insert("Host", "other.test");
        assert_eq!(original.get_first("host"), Some("example.com"));
    }

    #[test]
    fn test_state_round_trip_keeps_order_and_case() {
        let headers = sample();
        let restored = Headers::from_state("headers", &headers.to_state()).unwrap();
        assert_eq!(restored, headers);
    }

    #[test]
    fn test_from_state_rejects_bad_shape() {
        let value = serde_json::json!([["only-name"]]);
        assert!(matches!(
            Headers::from_state("headers", &value),
            Err(StateError::TypeMismatch { field: "headers", .. })
        ));
    }

    #[test]
    fn test_from_header_map() {
        let mut map = http::HeaderMap::new();
        map.append("x-dup", "1".parse().unwrap());
        map.append("x-dup", "2".parse().unwrap());

        let headers = Headers::from(&map);
        assert_eq!(headers.get_all("X-Dup"), vec!["1", "2"]);
    }
}
