//! Connect-target parsing for the client role.
//!
//! Grammar: `("ws"|"wss") "://" host [":" port] ["/" path]`. The scheme picks
//! the default port (80 for `ws`, 443 for `wss`) and whether TLS is required;
//! an explicit `:port` overrides the default and an explicit path overrides
//! the root path `/`.

use std::str::FromStr;

use crate::error::SetupError;

/// A parsed connect target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    /// Whether the `wss` scheme (TLS) was requested.
    pub secure: bool,
    /// Host name or address.
    pub host: String,
    /// Destination port, explicit or scheme default.
    pub port: u16,
    /// Request path, always starting with `/`.
    pub path: String,
}

impl Target {
    /// Reassemble a normalized URL for the engine's connect request.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{scheme}://{}:{}{}", self.host, self.port, self.path)
    }
}

impl FromStr for Target {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| SetupError::InvalidTarget(format!("missing scheme in {s:?}")))?;
        let (secure, default_port) = match scheme {
            "ws" => (false, 80),
            "wss" => (true, 443),
            other => {
                return Err(SetupError::InvalidTarget(format!(
                    "unsupported scheme {other:?}"
                )));
            }
        };
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], rest[idx..].to_string()),
            None => (rest, "/".to_string()),
        };
        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| SetupError::InvalidTarget(format!("invalid port {port:?}")))?;
                (host, port)
            }
            None => (authority, default_port),
        };
        if host.is_empty() {
            return Err(SetupError::InvalidTarget(format!("empty host in {s:?}")));
        }
        Ok(Target {
            secure,
            host: host.to_string(),
            port,
            path,
        })
    }
}
