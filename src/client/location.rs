//! Page location the client derives its socket URL from.

use url::Url;

use crate::error::ClientError;

/// Protocol, host and path of the page hosting the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// Scheme with trailing colon, e.g. `https:`
    pub protocol: String,
    /// Host name including a non-default port
    pub host: String,
    pub pathname: String,
}

impl PageLocation {
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        pathname: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            pathname: pathname.into(),
        }
    }

    /// Split an absolute page URL into its location parts
    pub fn parse(page_url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(page_url)?;
        let host = url
            .host_str()
            .ok_or_else(|| ClientError::MissingHost(page_url.to_string()))?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            protocol: format!("{}:", url.scheme()),
            host,
            pathname: url.path().to_string(),
        })
    }

    pub fn is_secure(&self) -> bool {
        self.protocol == "https:"
    }

    /// Socket URL for `route`, appended to the page path without normalization
    pub fn socket_url(&self, route: &str) -> String {
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        format!("{}://{}{}{}", scheme, self.host, self.pathname, route)
    }
}
