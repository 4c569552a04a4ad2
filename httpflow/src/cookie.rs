//! `Set-Cookie` values.

use crate::date;

/// A parsed `Set-Cookie` header value.
///
/// Attributes keep their original order and spelling so that serializing an
/// unmodified cookie gives back an equivalent header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub attributes: Vec<(String, Option<String>)>,
}

impl SetCookie {
    /// Parse a header value. Returns `None` when there is no `name=value`
    /// pair.
    pub fn parse(header: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let attributes = parts
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                None => (part.to_string(), None),
            })
            .collect();

        Some(Self {
            name: name.to_string(),
            value: value.trim().to_string(),
            attributes,
        })
    }

    /// First value of the attribute `name`, compared case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    /// Remove every attribute called `name`.
    pub fn remove_attribute(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// Shift the `expires` attribute by `delta` seconds.
    ///
    /// An `expires` that does not parse is dropped.
    pub fn shift_expires(&mut self, delta: f64) {
        for (key, value) in self.attributes.iter_mut() {
            if !key.eq_ignore_ascii_case("expires") {
                continue;
            }
            *value = value
                .as_deref()
                .and_then(|v| date::shift_http_date(v, delta));
        }
        let before = self.attributes.len();
        self.attributes
            .retain(|(k, v)| !(k.eq_ignore_ascii_case("expires") && v.is_none()));
        if self.attributes.len() != before {
            tracing::debug!(
                target: "httpflow",
                cookie = %self.name,
                "dropped unparseable cookie expiry"
            );
        }
    }
}

impl std::fmt::Display for SetCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.value)?;
        for (key, value) in &self.attributes {
            match value {
                Some(value) => write!(f, "; {key}={value}")?,
                None => write!(f, "; {key}")?,
            }
        }
        Ok(())
    }
}

/// Refresh one `Set-Cookie` header value for replay. Values that are not
/// cookies are returned unchanged.
pub(crate) fn refresh_set_cookie(header: &str, delta: f64) -> String {
    match SetCookie::parse(header) {
        Some(mut cookie) => {
            cookie.shift_expires(delta);
            cookie.to_string()
        }
        None => header.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cookie = SetCookie::parse("sid=abc; Path=/; HttpOnly; Max-Age=60").unwrap();
        assert_eq!(cookie.name, "sid");
        assert_eq!(cookie.value, "abc");
        assert_eq!(cookie.attribute("path"), Some("/"));
        assert_eq!(cookie.attribute("httponly"), None);
        assert_eq!(cookie.to_string(), "sid=abc; Path=/; HttpOnly; Max-Age=60");
    }

    #[test]
    fn test_parse_rejects_bare_token() {
        assert_eq!(SetCookie::parse("garbage"), None);
        assert_eq!(SetCookie::parse("=value"), None);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let cookie = SetCookie::parse("token=a=b==; Secure").unwrap();
        assert_eq!(cookie.value, "a=b==");
        assert_eq!(cookie.to_string(), "token=a=b==; Secure");
    }

    #[test]
    fn test_refresh_shifts_expires() {
        let refreshed =
            refresh_set_cookie("sid=abc; expires=Thu, 31-Dec-2037 23:59:59 GMT; path=/", 3600.0);
        assert_eq!(refreshed, "sid=abc; expires=Fri, 01 Jan 2038 00:59:59 GMT; path=/");
    }

    #[test]
    fn test_refresh_shifts_utc_and_asctime_expires() {
        assert_eq!(
            refresh_set_cookie("sid=abc; expires=Sun, 06 Nov 1994 08:49:37 UTC", 60.0),
            "sid=abc; expires=Sun, 06 Nov 1994 08:50:37 GMT"
        );
        assert_eq!(
            refresh_set_cookie("sid=abc; expires=Sun Nov  6 08:49:37 1994", 60.0),
            "sid=abc; expires=Sun, 06 Nov 1994 08:50:37 GMT"
        );
    }

    #[test]
    fn test_refresh_drops_unparseable_expires() {
        let refreshed = refresh_set_cookie("sid=abc; Expires=whenever; Secure", 3600.0);
        assert_eq!(refreshed, "sid=abc; Secure");
    }

    #[test]
    fn test_refresh_without_expires_is_unchanged() {
        assert_eq!(refresh_set_cookie("sid=abc; path=/", 10.0), "sid=abc; path=/");
        assert_eq!(refresh_set_cookie("not a cookie", 10.0), "not a cookie");
    }
}
