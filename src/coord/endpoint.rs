//! Coordination backend connection strings.
//!
//! An endpoint is a comma-separated ensemble list: "host:port[,host:port...]".
//! Parsing rejects empty strings, empty hosts, and missing or zero ports, so
//! the session task only ever dials well-formed addresses.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error type for endpoint parsing.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    #[error("endpoint string is empty")]
    Empty,

    #[error("server entry {0:?} is not host:port")]
    MissingPort(String),

    #[error("server entry {0:?} has an empty host")]
    EmptyHost(String),

    #[error("server entry {0:?} has an invalid port")]
    InvalidPort(String),
}

/// A validated coordination ensemble connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinationEndpoint {
    raw: String,
    servers: Vec<String>,
}

impl CoordinationEndpoint {
    /// The individual "host:port" entries, in the order they were given.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }
}

impl fmt::Display for CoordinationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for CoordinationEndpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }

        let mut servers = Vec::new();
        for entry in trimmed.split(',') {
            let entry = entry.trim();
            let (host, port) = entry
                .rsplit_once(':')
                .ok_or_else(|| EndpointParseError::MissingPort(entry.to_string()))?;
            if host.is_empty() {
                return Err(EndpointParseError::EmptyHost(entry.to_string()));
            }
            match port.parse::<u16>() {
                Ok(p) if p > 0 => {}
                _ => return Err(EndpointParseError::InvalidPort(entry.to_string())),
            }
            servers.push(entry.to_string());
        }

        Ok(Self {
            raw: trimmed.to_string(),
            servers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_server() {
        let ep: CoordinationEndpoint = "127.0.0.1:2181".parse().unwrap();
        assert_eq!(ep.servers(), ["127.0.0.1:2181"]);
        assert_eq!(ep.to_string(), "127.0.0.1:2181");
    }

    #[test]
    fn parses_ensemble() {
        let ep: CoordinationEndpoint = "zk1:2181, zk2:2181,zk3:2182".parse().unwrap();
        assert_eq!(ep.servers(), ["zk1:2181", "zk2:2181", "zk3:2182"]);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            "  ".parse::<CoordinationEndpoint>(),
            Err(EndpointParseError::Empty)
        ));
    }

    #[test]
    fn rejects_missing_port() {
        assert!(matches!(
            "localhost".parse::<CoordinationEndpoint>(),
            Err(EndpointParseError::MissingPort(_))
        ));
    }

    #[test]
    fn rejects_port_zero() {
        assert!(matches!(
            "localhost:0".parse::<CoordinationEndpoint>(),
            Err(EndpointParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn rejects_empty_host() {
        assert!(matches!(
            ":2181".parse::<CoordinationEndpoint>(),
            Err(EndpointParseError::EmptyHost(_))
        ));
    }
}
