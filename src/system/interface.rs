//! Interface activation through wg-quick

use std::path::Path;

use super::command::CommandRunner;
use crate::error::ActivationError;

/// Number of journal lines attached to an activation failure
const JOURNAL_LINES: &str = "20";

/// Brings a WireGuard interface up from an installed config, or down again
///
/// Both directions take the config path: `wg-quick` resolves a bare name
/// against `/etc/wireguard` only.
pub trait InterfaceController {
    fn up(&self, name: &str, config: &Path) -> Result<(), ActivationError>;
    fn down(&self, name: &str, config: &Path) -> Result<(), ActivationError>;
}

/// `wg-quick` with optional systemd boot enablement
pub struct WgQuick<R> {
    runner: R,
    enable_on_boot: bool,
}

impl<R: CommandRunner> WgQuick<R> {
    pub fn new(runner: R, enable_on_boot: bool) -> Self {
        Self {
            runner,
            enable_on_boot,
        }
    }

    fn unit(name: &str) -> String {
        format!("wg-quick@{}", name)
    }

    fn is_up(&self, name: &str) -> bool {
        matches!(self.runner.run("ip", &["link", "show", name]), Ok(output) if output.success())
    }

    /// Tail of the unit's journal, for operators diagnosing a failed bring-up
    fn journal(&self, name: &str) -> Option<String> {
        let unit = Self::unit(name);
        match self
            .runner
            .run("journalctl", &["-u", &unit, "-n", JOURNAL_LINES, "--no-pager"])
        {
            Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                Some(output.stdout.trim_end().to_string())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Could not read journal for {}: {}", unit, e);
                None
            }
        }
    }
}

impl<R: CommandRunner> InterfaceController for WgQuick<R> {
    fn up(&self, name: &str, config: &Path) -> Result<(), ActivationError> {
        if self.is_up(name) {
            tracing::info!("{} is already up, bringing it down first", name);
            self.down(name, config)?;
        }

        let config = config.to_string_lossy();
        tracing::info!("Bringing up {} from {}", name, config);

        if let Err(source) = self.runner.run_checked("wg-quick", &["up", &config]) {
            let diagnostics = self.journal(name);
            tracing::error!("Failed to bring up {}: {}", name, source);
            return Err(ActivationError::Up {
                interface: name.to_string(),
                source,
                diagnostics,
            });
        }

        if self.enable_on_boot {
            let unit = Self::unit(name);
            self.runner
                .run_checked("systemctl", &["enable", &unit])
                .map_err(|source| ActivationError::Enable {
                    unit: unit.clone(),
                    source,
                })?;
            tracing::info!("Enabled {} at boot", unit);
        }

        tracing::info!("Interface {} is up", name);
        Ok(())
    }

    fn down(&self, name: &str, config: &Path) -> Result<(), ActivationError> {
        let config = config.to_string_lossy();
        self.runner
            .run_checked("wg-quick", &["down", &config])
            .map_err(|source| ActivationError::Down {
                interface: name.to_string(),
                source,
            })?;
        tracing::info!("Interface {} is down", name);
        Ok(())
    }
}
