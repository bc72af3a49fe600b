//! Strict WireGuard configuration parser
//!
//! Parses a finished `.conf` document into typed [Interface] and [Peer]
//! sections. The merge engine treats values as opaque text; this parser is
//! what the installer uses to lint the merged result before it goes live.

use std::net::IpAddr;
use std::path::Path;

use ipnet::IpNet;

use crate::crypto::x25519;
use crate::error::ConfigError;

/// Complete WireGuard configuration
#[derive(Debug, Clone)]
pub struct WireGuardConfig {
    /// Interface configuration (our side)
    pub interface: InterfaceConfig,
    /// Peer configurations
    pub peers: Vec<PeerConfig>,
}

/// Interface (local) configuration
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    /// Our private key (32 bytes)
    pub private_key: [u8; 32],
    /// VPN addresses with prefix, IPv4 and IPv6
    pub address: Vec<IpNet>,
    /// DNS servers or search domains
    pub dns: Vec<String>,
    /// Listen port (optional, for servers)
    pub listen_port: Option<u16>,
    /// MTU (optional)
    pub mtu: Option<u16>,
}

/// Peer configuration
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Peer's public key (32 bytes)
    pub public_key: [u8; 32],
    /// Pre-shared key (optional, 32 bytes)
    pub preshared_key: Option<[u8; 32]>,
    /// Peer's endpoint as written (`host:port`)
    pub endpoint: Option<String>,
    /// Allowed IP ranges for this peer
    pub allowed_ips: Vec<IpNet>,
    /// Keepalive interval in seconds (optional)
    pub persistent_keepalive: Option<u16>,
}

impl WireGuardConfig {
    /// Parse a WireGuard configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// Parse a WireGuard configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut interface: Option<InterfaceBuilder> = None;
        let mut peers: Vec<PeerConfig> = Vec::new();
        let mut current_peer: Option<PeerBuilder> = None;
        let mut section: Option<Section> = None;

        for (line_num, raw) in content.lines().enumerate() {
            let line_num = line_num + 1;
            let line = strip_comment(raw).trim();

            if line.is_empty() {
                continue;
            }

            if line.starts_with('[') {
                if let Some(peer) = current_peer.take() {
                    peers.push(peer.build(line_num)?);
                }

                section = Some(if line.eq_ignore_ascii_case("[interface]") {
                    if interface.is_some() {
                        return Err(ConfigError::ParseError {
                            line: line_num,
                            message: "Duplicate [Interface] section".to_string(),
                        });
                    }
                    interface = Some(InterfaceBuilder::default());
                    Section::Interface
                } else if line.eq_ignore_ascii_case("[peer]") {
                    current_peer = Some(PeerBuilder::default());
                    Section::Peer
                } else {
                    return Err(ConfigError::ParseError {
                        line: line_num,
                        message: format!("Unknown section: {}", line),
                    });
                });
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::ParseError {
                    line: line_num,
                    message: format!("Expected 'key = value', got: {}", line),
                });
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match (section, interface.as_mut(), current_peer.as_mut()) {
                (Some(Section::Interface), Some(iface), _) => {
                    iface.apply(&key, value, line_num)?;
                }
                (Some(Section::Peer), _, Some(peer)) => {
                    peer.apply(&key, value, line_num)?;
                }
                _ => {
                    return Err(ConfigError::ParseError {
                        line: line_num,
                        message: "Configuration value outside of any section".to_string(),
                    });
                }
            }
        }

        if let Some(peer) = current_peer.take() {
            peers.push(peer.build(0)?);
        }

        let interface = interface
            .ok_or(ConfigError::MissingField {
                field: "[Interface] section".to_string(),
            })?
            .build()?;

        Ok(WireGuardConfig { interface, peers })
    }

    /// Get our public key derived from the private key
    pub fn public_key(&self) -> [u8; 32] {
        x25519::public_key(&self.interface.private_key)
    }
}

/// Section type during parsing
#[derive(Clone, Copy)]
enum Section {
    Interface,
    Peer,
}

#[derive(Default)]
struct InterfaceBuilder {
    private_key: Option<[u8; 32]>,
    address: Vec<IpNet>,
    dns: Vec<String>,
    listen_port: Option<u16>,
    mtu: Option<u16>,
}

impl InterfaceBuilder {
    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        match key {
            "privatekey" => self.private_key = Some(parse_key(value, "PrivateKey")?),
            "address" => self.address.extend(parse_cidrs(value)?),
            "dns" => {
                for entry in split_list(value) {
                    // wg-quick accepts search domains next to resolver addresses
                    if entry.parse::<IpAddr>().is_err() && !is_hostname(entry) {
                        return Err(ConfigError::InvalidAddress {
                            value: entry.to_string(),
                        });
                    }
                    self.dns.push(entry.to_string());
                }
            }
            "listenport" => self.listen_port = Some(parse_number(value, "ListenPort", line)?),
            "mtu" => self.mtu = Some(parse_number(value, "MTU", line)?),
            _ => {
                // Table, PreUp, PostUp, SaveConfig, ... are handled by wg-quick
                tracing::debug!("Unchecked interface key: {}", key);
            }
        }
        Ok(())
    }

    fn build(self) -> Result<InterfaceConfig, ConfigError> {
        let private_key = self.private_key.ok_or(ConfigError::MissingField {
            field: "PrivateKey".to_string(),
        })?;

        Ok(InterfaceConfig {
            private_key,
            address: self.address,
            dns: self.dns,
            listen_port: self.listen_port,
            mtu: self.mtu,
        })
    }
}

/// Builder for PeerConfig during parsing
#[derive(Default)]
struct PeerBuilder {
    public_key: Option<[u8; 32]>,
    preshared_key: Option<[u8; 32]>,
    endpoint: Option<String>,
    allowed_ips: Vec<IpNet>,
    persistent_keepalive: Option<u16>,
}

impl PeerBuilder {
    fn apply(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        match key {
            "publickey" => self.public_key = Some(parse_key(value, "PublicKey")?),
            "presharedkey" => self.preshared_key = Some(parse_key(value, "PresharedKey")?),
            "endpoint" => self.endpoint = Some(parse_endpoint(value)?),
            "allowedips" => self.allowed_ips.extend(parse_cidrs(value)?),
            "persistentkeepalive" => {
                self.persistent_keepalive = Some(if value.eq_ignore_ascii_case("off") {
                    0
                } else {
                    parse_number(value, "PersistentKeepalive", line)?
                });
            }
            _ => tracing::debug!("Unchecked peer key: {}", key),
        }
        Ok(())
    }

    fn build(self, line: usize) -> Result<PeerConfig, ConfigError> {
        let public_key = self.public_key.ok_or(ConfigError::MissingField {
            field: if line > 0 {
                format!("PublicKey in [Peer] ending before line {}", line)
            } else {
                "PublicKey in [Peer]".to_string()
            },
        })?;

        Ok(PeerConfig {
            public_key,
            preshared_key: self.preshared_key,
            endpoint: self.endpoint,
            allowed_ips: self.allowed_ips,
            persistent_keepalive: self.persistent_keepalive,
        })
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(index) => &line[..index],
        None => line,
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a base64-encoded 32-byte key
fn parse_key(value: &str, field_name: &str) -> Result<[u8; 32], ConfigError> {
    x25519::decode_key(value).map_err(|_| ConfigError::InvalidKey {
        field: field_name.to_string(),
    })
}

fn parse_cidrs(value: &str) -> Result<Vec<IpNet>, ConfigError> {
    split_list(value)
        .map(|entry| {
            // A bare address means a host route
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|_| ConfigError::InvalidCidr {
                    value: entry.to_string(),
                })
        })
        .collect()
}

fn parse_number(value: &str, field: &str, line: usize) -> Result<u16, ConfigError> {
    value.parse().map_err(|_| ConfigError::ParseError {
        line,
        message: format!("Invalid {}: {}", field, value),
    })
}

/// Parse an endpoint (`host:port` or `[v6]:port`), keeping it as text
fn parse_endpoint(value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidAddress {
        value: value.to_string(),
    };

    let (host, port) = value.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;

    let host_ok = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(v6) => v6.parse::<std::net::Ipv6Addr>().is_ok(),
        None => host.parse::<std::net::Ipv4Addr>().is_ok() || is_hostname(host),
    };
    if !host_ok {
        return Err(invalid());
    }

    Ok(value.to_string())
}

fn is_hostname(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 253
        && value.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}
