//! Settings for synthesized messages.

use serde::Deserialize;

use crate::error::Result;

/// Default `Server` / `Proxy-Agent` value.
pub const DEFAULT_AGENT: &str = concat!("httpflow ", env!("CARGO_PKG_VERSION"));

/// Configuration for the message builders in [`synth`](crate::synth).
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Product token sent in `Server` and `Proxy-Agent`.
    pub agent: String,
    /// HTML-escape the caller's message in generated error pages.
    pub escape_error_messages: bool,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            agent: DEFAULT_AGENT.to_string(),
            escape_error_messages: false,
        }
    }
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = agent.into();
        self
    }

    pub fn escape_error_messages(mut self, escape: bool) -> Self {
        self.escape_error_messages = escape;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_default_agent_has_version() {
        let config = FlowConfig::default();
        assert!(config.agent.starts_with("httpflow "));
        assert!(!config.escape_error_messages);
    }

    #[test]
    fn test_from_json_partial() {
        let config = FlowConfig::from_json(r#"{"escape_error_messages": true}"#).unwrap();
        assert!(config.escape_error_messages);
        assert_eq!(config.agent, DEFAULT_AGENT);
    }

    #[test]
    fn test_from_json_invalid() {
        let err = FlowConfig::from_json(r#"{"agent": 5}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_builder() {
        let config = FlowConfig::new().agent("proxy/2").escape_error_messages(true);
        assert_eq!(config.agent, "proxy/2");
        assert!(config.escape_error_messages);
    }
}
