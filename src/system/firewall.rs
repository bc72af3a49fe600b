//! Host firewall policy
//!
//! The rules are derived from the installed document through field
//! extraction; the merge engine itself knows nothing about firewalls.

use super::command::CommandRunner;
use crate::config::NormalizedDocument;
use crate::error::HardeningError;

/// Interface field holding the UDP port WireGuard listens on
pub const LISTEN_PORT_FIELD: &str = "ListenPort";

/// Ports the firewall has to let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirewallRules {
    /// SSH, so enabling the firewall does not lock the operator out
    pub ssh_port: u16,
    /// WireGuard listen port, when the config sets a valid one
    pub listen_port: Option<u16>,
}

impl FirewallRules {
    pub fn from_document(document: &NormalizedDocument, ssh_port: u16) -> Self {
        let listen_port = document
            .extract_field(LISTEN_PORT_FIELD)
            .and_then(|value| match value.parse::<u16>() {
                Ok(0) | Err(_) => {
                    tracing::warn!("Ignoring invalid {} value {:?}", LISTEN_PORT_FIELD, value);
                    None
                }
                Ok(port) => Some(port),
            });

        Self {
            ssh_port,
            listen_port,
        }
    }
}

pub trait FirewallPolicy {
    fn apply(&self, rules: &FirewallRules) -> Result<(), HardeningError>;
}

/// Uncomplicated Firewall
pub struct Ufw<R> {
    runner: R,
}

impl<R: CommandRunner> Ufw<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn ufw(&self, args: &[&str]) -> Result<(), HardeningError> {
        self.runner
            .run_checked("ufw", args)
            .map(|_| ())
            .map_err(HardeningError::Firewall)
    }
}

impl<R: CommandRunner> FirewallPolicy for Ufw<R> {
    fn apply(&self, rules: &FirewallRules) -> Result<(), HardeningError> {
        // Allow rules go in before the firewall is switched on
        self.ufw(&["allow", &format!("{}/tcp", rules.ssh_port)])?;

        match rules.listen_port {
            Some(port) => {
                self.ufw(&["allow", &format!("{}/udp", port)])?;
                tracing::info!("Firewall allows WireGuard on UDP {}", port);
            }
            None => {
                tracing::info!("No {} in config, no UDP port opened", LISTEN_PORT_FIELD);
            }
        }

        self.ufw(&["--force", "enable"])?;
        tracing::info!("Firewall enabled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::command::testing::ScriptedRunner;

    fn document(text: &str) -> NormalizedDocument {
        NormalizedDocument::from_lines(text.lines())
    }

    #[test]
    fn test_rules_from_listen_port() {
        let doc = document("[Interface]\nListenPort = 51820\n");
        let rules = FirewallRules::from_document(&doc, 22);
        assert_eq!(rules.listen_port, Some(51820));
        assert_eq!(rules.ssh_port, 22);
    }

    #[test]
    fn test_rules_without_listen_port() {
        let doc = document("[Interface]\nAddress = 10.0.0.1/24\n");
        let rules = FirewallRules::from_document(&doc, 22);
        assert_eq!(rules.listen_port, None);
    }

    #[test]
    fn test_rules_with_invalid_listen_port() {
        for value in ["abc", "70000", "0", "-1"] {
            let text = format!("[Interface]\nListenPort = {}\n", value);
            let rules = FirewallRules::from_document(&document(&text), 22);
            assert_eq!(rules.listen_port, None, "accepted {}", value);
        }
    }

    #[test]
    fn test_ufw_commands() {
        let runner = ScriptedRunner::new();
        Ufw::new(&runner)
            .apply(&FirewallRules {
                ssh_port: 2222,
                listen_port: Some(51820),
            })
            .unwrap();

        assert_eq!(
            runner.calls(),
            vec!["ufw allow 2222/tcp", "ufw allow 51820/udp", "ufw --force enable"]
        );
    }

    #[test]
    fn test_ufw_without_listen_port() {
        let runner = ScriptedRunner::new();
        Ufw::new(&runner)
            .apply(&FirewallRules {
                ssh_port: 22,
                listen_port: None,
            })
            .unwrap();

        assert_eq!(runner.calls(), vec!["ufw allow 22/tcp", "ufw --force enable"]);
    }

    #[test]
    fn test_ufw_failure_stops_before_enable() {
        let runner =
            ScriptedRunner::new().fail("ufw allow 22/tcp", 1, "ERROR: You need to be root");
        let result = Ufw::new(&runner).apply(&FirewallRules {
            ssh_port: 22,
            listen_port: Some(51820),
        });

        assert!(matches!(result, Err(HardeningError::Firewall(_))));
        assert_eq!(runner.calls(), vec!["ufw allow 22/tcp"]);
    }
}
