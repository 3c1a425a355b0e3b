//! MQTT broker addressing and TLS transport selection.

use anyhow::{anyhow, Context, Result};
use rumqttc::Transport;
use std::path::Path;

/// MQTT broker endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MqttEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl MqttEndpoint {
    /// Build a rumqttc transport for this endpoint.
    ///
    /// TLS uses the CA in `materials` when present, otherwise the default
    /// root store.
    pub fn transport(&self, materials: &TlsMaterials) -> Result<Transport> {
        if !self.use_tls {
            if materials.is_configured() {
                return Err(anyhow!(
                    "MQTT TLS CA provided but TLS is disabled (use an mqtts:// broker address)"
                ));
            }
            return Ok(Transport::tcp());
        }
        match &materials.ca {
            Some(ca) => Ok(Transport::tls(ca.clone(), None, None)),
            None => Ok(Transport::tls_with_default_config()),
        }
    }
}

/// TLS certificate materials for MQTT connections.
#[derive(Clone, Debug, Default)]
pub struct TlsMaterials {
    /// PEM-encoded CA certificate bytes. `None` uses the default roots.
    pub ca: Option<Vec<u8>>,
}

impl TlsMaterials {
    pub fn load(ca_path: Option<&Path>) -> Result<Self> {
        let ca = match ca_path {
            Some(path) => Some(
                std::fs::read(path)
                    .with_context(|| format!("failed to read MQTT TLS CA '{}'", path.display()))?,
            ),
            None => None,
        };
        Ok(Self { ca })
    }

    pub fn is_configured(&self) -> bool {
        self.ca.is_some()
    }
}

/// Parse MQTT endpoint from address string.
///
/// Supports formats:
/// - `host:port` (plain TCP)
/// - `mqtt://host:port` or `tcp://host:port` (plain TCP)
/// - `mqtts://host:port` or `ssl://host:port` (TLS)
/// - `[ipv6]:port`
pub fn parse_mqtt_endpoint(addr: &str) -> Result<MqttEndpoint> {
    let mut use_tls = false;
    let mut remainder = addr.trim();

    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            "mqtts" | "ssl" => use_tls = true,
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }

    let (host, port) = split_host_port(remainder)?;
    if host.is_empty() {
        return Err(anyhow!("missing MQTT host in {}", addr));
    }
    Ok(MqttEndpoint {
        host,
        port,
        use_tls,
    })
}

fn split_host_port(addr: &str) -> Result<(String, u16)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = rest
            .strip_prefix(':')
            .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid MQTT port in {}", addr))?;
        return Ok((host.to_string(), port));
    }

    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| anyhow!("missing MQTT port in {}", addr))?;
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid MQTT port in {}", addr))?;
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_endpoint_plain() {
        let ep = parse_mqtt_endpoint("test.mosquitto.org:1883").unwrap();
        assert_eq!(ep.host, "test.mosquitto.org");
        assert_eq!(ep.port, 1883);
        assert!(!ep.use_tls);
    }

    #[test]
    fn parse_endpoint_mqtts_scheme() {
        let ep = parse_mqtt_endpoint("mqtts://broker.example.com:8883").unwrap();
        assert_eq!(ep.host, "broker.example.com");
        assert_eq!(ep.port, 8883);
        assert!(ep.use_tls);
    }

    #[test]
    fn parse_endpoint_ipv6() {
        let ep = parse_mqtt_endpoint("[::1]:1883").unwrap();
        assert_eq!(ep.host, "::1");
        assert_eq!(ep.port, 1883);
    }

    #[test]
    fn parse_endpoint_rejects_bad_input() {
        assert!(parse_mqtt_endpoint("broker-without-port").is_err());
        assert!(parse_mqtt_endpoint("ws://broker:80").is_err());
        assert!(parse_mqtt_endpoint(":1883").is_err());
        assert!(parse_mqtt_endpoint("broker:notaport").is_err());
    }

    #[test]
    fn ca_without_tls_is_rejected() {
        let ep = parse_mqtt_endpoint("localhost:1883").unwrap();
        let materials = TlsMaterials {
            ca: Some(b"-----BEGIN CERTIFICATE-----".to_vec()),
        };
        assert!(ep.transport(&materials).is_err());
        assert!(ep.transport(&TlsMaterials::default()).is_ok());
    }

    #[test]
    fn missing_ca_file_is_reported() {
        let err = TlsMaterials::load(Some(Path::new("/nonexistent/ca.pem"))).unwrap_err();
        assert!(err.to_string().contains("MQTT TLS CA"));
    }
}
