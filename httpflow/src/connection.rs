//! Connection records referenced by flows.
//!
//! Connections are owned by the proxy layer; a flow only keeps an `Arc` to
//! the records so that copies of a flow share them.

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde_json::Value;

use crate::date;
use crate::error::{AddressError, StateError};
use crate::state::{self, Field, FieldKind, StateMode, StateObject};

/// Canonical `(host, port)` address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address {
    pub host: String,
    pub port: u16,
    pub use_ipv6: bool,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        let use_ipv6 = host.parse::<std::net::Ipv6Addr>().is_ok();
        Self {
            host,
            port,
            use_ipv6,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.use_ipv6 {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<(&str, u16)> for Address {
    fn from((host, port): (&str, u16)) -> Self {
        Address::new(host, port)
    }
}

impl From<(String, u16)> for Address {
    fn from((host, port): (String, u16)) -> Self {
        Address::new(host, port)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            host: addr.ip().to_string(),
            port: addr.port(),
            use_ipv6: matches!(addr.ip(), IpAddr::V6(_)),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parse `host:port` or `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.strip_prefix('[') {
            Some(rest) => {
                let (host, port) = rest
                    .split_once(']')
                    .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
                let port = port
                    .strip_prefix(':')
                    .ok_or_else(|| AddressError::MissingPort(s.to_string()))?;
                (host, port)
            }
            None => s
                .rsplit_once(':')
                .ok_or_else(|| AddressError::MissingPort(s.to_string()))?,
        };
        if host.is_empty() {
            return Err(AddressError::EmptyHost(s.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| AddressError::InvalidPort(s.to_string()))?;
        Ok(Address::new(host, port))
    }
}

impl StateObject for Address {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "address",
            FieldKind::Tuple,
            |a, _| Value::Array(vec![Value::from(a.host.as_str()), Value::from(a.port)]),
            |a, v| {
                let Some([host, port]) = v.as_array().map(Vec::as_slice) else {
                    return Err(StateError::TypeMismatch {
                        field: "address",
                        expected: "a [host, port] pair",
                    });
                };
                a.host = state::to_str("address", host)?;
                a.port = state::to_u16("address", port)?;
                Ok(())
            },
        ),
        Field::new(
            "use_ipv6",
            FieldKind::Bool,
            |a, _| Value::Bool(a.use_ipv6),
            |a, v| {
                a.use_ipv6 = state::to_bool("use_ipv6", v)?;
                Ok(())
            },
        ),
    ];
}

fn get_address(address: &Address, mode: StateMode) -> Value {
    state::get_state(address, mode)
}

fn set_address(field: &'static str, address: &mut Address, v: &Value) -> Result<(), StateError> {
    if v.is_null() {
        return Err(StateError::MissingField(field));
    }
    state::load_state(address, v)
}

fn opt_str(v: &Option<String>) -> Value {
    v.as_deref().map_or(Value::Null, Value::from)
}

/// The client side of a proxied connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConnection {
    pub address: Address,
    pub tls_established: bool,
    /// Server name the client asked for during the TLS handshake.
    pub sni: Option<String>,
    pub cipher_name: Option<String>,
    pub tls_version: Option<String>,
    pub timestamp_start: Option<f64>,
    pub timestamp_tls_setup: Option<f64>,
    pub timestamp_end: Option<f64>,
}

impl ClientConnection {
    /// A connection from `address`, started now.
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            timestamp_start: Some(date::now()),
            ..Default::default()
        }
    }
}

impl StateObject for ClientConnection {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "address",
            FieldKind::Nested,
            |c, mode| get_address(&c.address, mode),
            |c, v| set_address("address", &mut c.address, v),
        ),
        Field::new(
            "tls_established",
            FieldKind::Bool,
            |c, _| Value::Bool(c.tls_established),
            |c, v| {
                c.tls_established = state::to_bool("tls_established", v)?;
                Ok(())
            },
        ),
        Field::new(
            "sni",
            FieldKind::Str,
            |c, _| opt_str(&c.sni),
            |c, v| {
                c.sni = state::to_opt_str("sni", v)?;
                Ok(())
            },
        ),
        Field::new(
            "cipher_name",
            FieldKind::Str,
            |c, _| opt_str(&c.cipher_name),
            |c, v| {
                c.cipher_name = state::to_opt_str("cipher_name", v)?;
                Ok(())
            },
        ),
        Field::new(
            "tls_version",
            FieldKind::Str,
            |c, _| opt_str(&c.tls_version),
            |c, v| {
                c.tls_version = state::to_opt_str("tls_version", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_start",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_start),
            |c, v| {
                c.timestamp_start = state::to_opt_f64("timestamp_start", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_tls_setup",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_tls_setup),
            |c, v| {
                c.timestamp_tls_setup = state::to_opt_f64("timestamp_tls_setup", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_end",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_end),
            |c, v| {
                c.timestamp_end = state::to_opt_f64("timestamp_end", v)?;
                Ok(())
            },
        ),
    ];
}

/// The upstream side of a proxied connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerConnection {
    /// Address as requested; may be a domain name.
    pub address: Address,
    /// Resolved remote address.
    pub ip_address: Option<Address>,
    /// Local address the connection was made from.
    pub source_address: Option<Address>,
    pub tls_established: bool,
    pub sni: Option<String>,
    pub timestamp_start: Option<f64>,
    pub timestamp_tcp_setup: Option<f64>,
    pub timestamp_tls_setup: Option<f64>,
    pub timestamp_end: Option<f64>,
}

impl ServerConnection {
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }
}

impl StateObject for ServerConnection {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "address",
            FieldKind::Nested,
            |c, mode| get_address(&c.address, mode),
            |c, v| set_address("address", &mut c.address, v),
        ),
        Field::new(
            "ip_address",
            FieldKind::Nested,
            |c, mode| state::get_nested(c.ip_address.as_ref(), mode),
            |c, v| state::load_nested(&mut c.ip_address, v),
        ),
        Field::new(
            "source_address",
            FieldKind::Nested,
            |c, mode| state::get_nested(c.source_address.as_ref(), mode),
            |c, v| state::load_nested(&mut c.source_address, v),
        ),
        Field::new(
            "tls_established",
            FieldKind::Bool,
            |c, _| Value::Bool(c.tls_established),
            |c, v| {
                c.tls_established = state::to_bool("tls_established", v)?;
                Ok(())
            },
        ),
        Field::new(
            "sni",
            FieldKind::Str,
            |c, _| opt_str(&c.sni),
            |c, v| {
                c.sni = state::to_opt_str("sni", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_start",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_start),
            |c, v| {
                c.timestamp_start = state::to_opt_f64("timestamp_start", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_tcp_setup",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_tcp_setup),
            |c, v| {
                c.timestamp_tcp_setup = state::to_opt_f64("timestamp_tcp_setup", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_tls_setup",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_tls_setup),
            |c, v| {
                c.timestamp_tls_setup = state::to_opt_f64("timestamp_tls_setup", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp_end",
            FieldKind::Float,
            |c, _| state::from_opt_f64(c.timestamp_end),
            |c, v| {
                c.timestamp_end = state::to_opt_f64("timestamp_end", v)?;
                Ok(())
            },
        ),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{from_state, get_state};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("example.com:443", "example.com", 443, false)]
    #[case("127.0.0.1:8080", "127.0.0.1", 8080, false)]
    #[case("[::1]:22", "::1", 22, true)]
    #[case("[2001:db8::1]:80", "2001:db8::1", 80, true)]
    fn test_parse_address(
        #[case] input: &str,
        #[case] host: &str,
        #[case] port: u16,
        #[case] use_ipv6: bool,
    ) {
        let address: Address = input.parse().unwrap();
        assert_eq!(address.host, host);
        assert_eq!(address.port, port);
        assert_eq!(address.use_ipv6, use_ipv6);
        assert_eq!(address.to_string(), input);
    }

    #[rstest]
    #[case("example.com", AddressError::MissingPort("example.com".into()))]
    #[case("[::1]", AddressError::MissingPort("[::1]".into()))]
    #[case(":80", AddressError::EmptyHost(":80".into()))]
    #[case("example.com:http", AddressError::InvalidPort("example.com:http".into()))]
    #[case("example.com:70000", AddressError::InvalidPort("example.com:70000".into()))]
    fn test_parse_address_errors(#[case] input: &str, #[case] expected: AddressError) {
        assert_eq!(input.parse::<Address>().unwrap_err(), expected);
    }

    #[test]
    fn test_address_from_socket_addr() {
        let v4: SocketAddr = "10.0.0.1:3128".parse().unwrap();
        assert_eq!(Address::from(v4), Address::new("10.0.0.1", 3128));

        let v6: SocketAddr = "[::1]:443".parse().unwrap();
        let address = Address::from(v6);
        assert!(address.use_ipv6);
        assert_eq!(address.host, "::1");
    }

    #[test]
    fn test_address_state() {
        let address = Address::new("example.com", 80);
        let state = get_state(&address, StateMode::Full);
        assert_eq!(state, json!({"address": ["example.com", 80], "use_ipv6": false}));
        assert_eq!(from_state::<Address>(&state).unwrap(), address);
    }

    #[test]
    fn test_client_connection_round_trip() {
        let mut conn = ClientConnection::new(("192.168.1.2", 51234u16));
        conn.tls_established = true;
        conn.sni = Some("example.com".into());
        conn.tls_version = Some("TLSv1.3".into());

        let state = get_state(&conn, StateMode::Full);
        assert_eq!(state["cipher_name"], Value::Null);
        assert_eq!(from_state::<ClientConnection>(&state).unwrap(), conn);
    }

    #[test]
    fn test_server_connection_round_trip() {
        let mut conn = ServerConnection::new(("example.com", 443u16));
        conn.ip_address = Some(Address::new("93.184.216.34", 443));
        conn.timestamp_tcp_setup = Some(12.5);

        let state = get_state(&conn, StateMode::Full);
        assert_eq!(state["source_address"], Value::Null);
        assert_eq!(from_state::<ServerConnection>(&state).unwrap(), conn);
    }

    #[test]
    fn test_connection_requires_address() {
        let state = json!({"tls_established": false});
        assert_eq!(
            from_state::<ServerConnection>(&state).unwrap_err(),
            StateError::MissingField("address")
        );
    }
}
