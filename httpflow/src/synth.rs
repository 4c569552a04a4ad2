//! Builders for messages the proxy produces itself.
//!
//! Each builder exists as a [`FlowConfig`] method and as a free function
//! that uses the default configuration.

use crate::config::FlowConfig;
use crate::connection::Address;
use crate::headers::Headers;
use crate::message::{Body, HttpVersion, Message};
use crate::request::{HttpForm, Request};
use crate::response::{Response, reason_phrase};

impl FlowConfig {
    /// A minimal HTML error page.
    ///
    /// `headers` are applied first; `Server`, `Connection`, `Content-Length`
    /// and `Content-Type` are then forced. `message` is embedded verbatim
    /// unless [`escape_error_messages`](FlowConfig::escape_error_messages)
    /// is set.
    pub fn make_error_response(
        &self,
        status_code: u16,
        message: &str,
        headers: Option<Headers>,
    ) -> Response {
        let reason = reason_phrase(status_code);
        let message = if self.escape_error_messages {
            html_escape(message)
        } else {
            message.to_string()
        };
        let body = format!(
            "<html>\n    <head>\n        <title>{status_code} {reason}</title>\n    </head>\n    <body>{message}</body>\n</html>"
        );

        let mut headers = headers.unwrap_or_default();
        headers.insert("Server", self.agent.as_str());
        headers.insert("Connection", "close");
        headers.insert("Content-Length", body.len().to_string());
        headers.insert("Content-Type", "text/html");

        Response::new(
            status_code,
            reason,
            Message::new(HttpVersion::HTTP_11, headers, Body::from(body)),
        )
    }

    /// An authority-form `CONNECT` request for `address`.
    pub fn make_connect_request(&self, address: impl Into<Address>) -> Request {
        let address = address.into();
        Request::new(
            HttpForm::Authority,
            "CONNECT",
            None,
            address.host,
            address.port,
            None,
            Message::new(HttpVersion::HTTP_11, Headers::new(), Body::empty()),
        )
    }

    /// `200 Connection established`.
    pub fn make_connect_response(&self, http_version: HttpVersion) -> Response {
        let headers = Headers::from_iter([
            ("Content-Length", "0"),
            ("Proxy-Agent", self.agent.as_str()),
        ]);
        Response::new(
            200,
            "Connection established",
            Message::new(http_version, headers, Body::empty()),
        )
    }
}

pub fn make_error_response(status_code: u16, message: &str, headers: Option<Headers>) -> Response {
    FlowConfig::default().make_error_response(status_code, message, headers)
}

pub fn make_connect_request(address: impl Into<Address>) -> Request {
    FlowConfig::default().make_connect_request(address)
}

pub fn make_connect_response(http_version: HttpVersion) -> Response {
    FlowConfig::default().make_connect_response(http_version)
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
