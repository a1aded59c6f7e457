//! Server configuration.
//!
//! Loaded from YAML and overridden field by field from the command line:
//!
//! ```yaml
//! listen:
//!   host: 127.0.0.1
//!   port: 8080
//!   tls:
//!     cert_path: certs/server.pem
//!     key_path: certs/server.key
//! default_reply:
//!   status: 503
//!   body: "unavailable"
//! ```

mod listen;

pub use listen::{ListenConfig, TlsConfig};

use crate::matcher::ResponseSpec;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Reply for requests no matcher accepts; 404 "Not Found" when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_reply: Option<ResponseSpec>,
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.host.trim().is_empty() {
            anyhow::bail!("'listen.host' must not be empty");
        }

        if let Some(tls) = &self.listen.tls {
            if tls.cert_path.is_empty() || tls.key_path.is_empty() {
                anyhow::bail!(
                    "TLS configuration requires both 'listen.tls.cert_path' and 'listen.tls.key_path'"
                );
            }
        }

        if let Some(reply) = &self.default_reply {
            if !(100..=999).contains(&reply.status) {
                anyhow::bail!("Invalid default_reply status: {}", reply.status);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.host, "0.0.0.0");
        assert_eq!(config.listen.port, 0);
        assert_eq!(config.listen.scheme(), "http");
        assert!(config.default_reply.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen:
  host: 127.0.0.1
  port: 9911
default_reply:
  status: "503"
  headers:
    Retry-After: 5
  body:
    error: unavailable
"#
        )
        .unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen.host, "127.0.0.1");
        assert_eq!(config.listen.port, 9911);

        let reply = config.default_reply.unwrap();
        assert_eq!(reply.status, 503);
        assert_eq!(reply.body, Some(json!({"error": "unavailable"})));
        assert_eq!(
            reply.headers.unwrap().get("Retry-After").map(String::as_str),
            Some("5")
        );
    }

    #[test]
    fn test_validate_rejects_incomplete_tls() {
        let config = ServerConfig {
            listen: ListenConfig {
                tls: Some(TlsConfig {
                    cert_path: "cert.pem".into(),
                    key_path: String::new(),
                }),
                ..ListenConfig::default()
            },
            default_reply: None,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_default_status() {
        let config = ServerConfig {
            default_reply: Some(ResponseSpec::new(42)),
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ServerConfig::from_file("/nonexistent/sham.yaml").is_err());
    }
}
