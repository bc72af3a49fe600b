//! Provisioning pipeline
//!
//! One run goes through discrete steps connected by plain values:
//!
//! 1. install packages (optional)
//! 2. generate keys
//! 3. merge the template and lint the result
//! 4. persist the config owner-only
//! 5. bring the interface up
//! 6. firewall and intrusion guard (optional)
//!
//! The first failing step ends the run.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{
    ConfigDocument, ConfigMerger, Merged, NormalizedDocument, PlaceholderPolicy,
    ProvisionSettings, WireGuardConfig,
};
use crate::crypto::{x25519, KeyProvider, SecretMaterial};
use crate::error::{InstallError, Result};
use crate::install::{InstallTarget, MODE_OWNER_ONLY};
use crate::system::{
    FirewallPolicy, FirewallRules, InterfaceController, IntrusionGuard, PackageInstaller,
};

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub interface: String,
    pub config_path: PathBuf,
    pub public_key: String,
    pub injection: PlaceholderPolicy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen_port: Option<u16>,
    pub firewall_applied: bool,
    pub intrusion_guard_applied: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub packages_installed: Vec<String>,
}

/// What the optional hardening step ended up doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HardeningOutcome {
    pub listen_port: Option<u16>,
    pub firewall_applied: bool,
    pub intrusion_guard_applied: bool,
}

pub struct Provisioner<'a> {
    settings: &'a ProvisionSettings,
    keys: &'a dyn KeyProvider,
    target: &'a dyn InstallTarget,
    interface: &'a dyn InterfaceController,
    firewall: Option<&'a dyn FirewallPolicy>,
    guard: Option<&'a dyn IntrusionGuard>,
    packages: Option<&'a dyn PackageInstaller>,
    strict: bool,
    force: bool,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        settings: &'a ProvisionSettings,
        keys: &'a dyn KeyProvider,
        target: &'a dyn InstallTarget,
        interface: &'a dyn InterfaceController,
    ) -> Self {
        Self {
            settings,
            keys,
            target,
            interface,
            firewall: None,
            guard: None,
            packages: None,
            strict: false,
            force: false,
        }
    }

    pub fn with_firewall(mut self, firewall: &'a dyn FirewallPolicy) -> Self {
        self.firewall = Some(firewall);
        self
    }

    pub fn with_intrusion_guard(mut self, guard: &'a dyn IntrusionGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_packages(mut self, packages: &'a dyn PackageInstaller) -> Self {
        self.packages = Some(packages);
        self
    }

    /// Make lint failures fatal
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Overwrite an existing interface config
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Run every step for a collected template
    pub fn run(&self, template: &ConfigDocument) -> Result<ProvisionReport> {
        let path = self.destination()?;
        let packages_installed = self.install_packages()?;

        let secret = self.keys.generate()?;
        let merged = self.merge(template, &secret)?;
        self.lint(&merged.document, &secret)?;

        self.persist(&path, &merged.document)?;
        self.activate(&path)?;
        let hardening = self.harden(&merged.document)?;

        Ok(ProvisionReport {
            interface: self.settings.interface.clone(),
            config_path: path,
            public_key: secret.public_key().to_string(),
            injection: merged.policy,
            listen_port: hardening.listen_port,
            firewall_applied: hardening.firewall_applied,
            intrusion_guard_applied: hardening.intrusion_guard_applied,
            packages_installed,
        })
    }

    /// Config path for the interface, refusing to clobber one unless forced
    pub fn destination(&self) -> Result<PathBuf> {
        let path = self.settings.config_path();
        if !self.force && self.target.exists(&path) {
            return Err(InstallError::AlreadyExists { path }.into());
        }
        Ok(path)
    }

    /// Install the packages the enabled steps depend on
    pub fn install_packages(&self) -> Result<Vec<String>> {
        let Some(installer) = self.packages else {
            return Ok(Vec::new());
        };

        let mut packages = vec!["wireguard"];
        if self.firewall.is_some() {
            packages.push("ufw");
        }
        if self.guard.is_some() {
            packages.push("fail2ban");
        }

        installer.install(&packages)?;
        Ok(packages.into_iter().map(String::from).collect())
    }

    pub fn merge(&self, template: &ConfigDocument, secret: &SecretMaterial) -> Result<Merged> {
        let merger = ConfigMerger::new(
            self.settings.placeholder.as_str(),
            self.settings.key_field.as_str(),
        );
        let merged = merger.merge_with_policy(template, secret.private_key())?;
        tracing::info!("Merged template ({:?})", merged.policy);
        Ok(merged)
    }

    /// Strictly parse the merged document
    ///
    /// Problems are warnings unless the provisioner is strict.
    pub fn lint(&self, document: &NormalizedDocument, secret: &SecretMaterial) -> Result<()> {
        match WireGuardConfig::parse(&document.to_text()) {
            Ok(config) => {
                let derived = x25519::encode_key(&config.public_key());
                if derived != secret.public_key() {
                    tracing::warn!(
                        "Installed PrivateKey does not match the generated key; \
                         the template may hard-code a different key"
                    );
                }
                if config.peers.is_empty() {
                    tracing::warn!("Config has no [Peer] sections");
                }
                Ok(())
            }
            Err(e) if self.strict => Err(e.into()),
            Err(e) => {
                tracing::warn!("Config did not pass validation: {}", e);
                Ok(())
            }
        }
    }

    pub fn persist(&self, path: &Path, document: &NormalizedDocument) -> Result<()> {
        self.target
            .persist(path, &document.to_text(), MODE_OWNER_ONLY)?;
        Ok(())
    }

    pub fn activate(&self, path: &Path) -> Result<()> {
        self.interface.up(&self.settings.interface, path)?;
        Ok(())
    }

    /// Firewall and intrusion guard, each only when configured
    pub fn harden(&self, document: &NormalizedDocument) -> Result<HardeningOutcome> {
        let rules = FirewallRules::from_document(document, self.settings.ssh_port);
        let mut outcome = HardeningOutcome {
            listen_port: rules.listen_port,
            ..HardeningOutcome::default()
        };

        if let Some(firewall) = self.firewall {
            firewall.apply(&rules)?;
            outcome.firewall_applied = true;
        }

        if let Some(guard) = self.guard {
            guard.apply(&self.settings.jail)?;
            outcome.intrusion_guard_applied = true;
        }

        Ok(outcome)
    }
}
