//! Intrusion prevention through fail2ban

use super::command::CommandRunner;
use crate::config::JailSettings;
use crate::error::{HardeningError, InstallError};
use crate::install::{InstallTarget, MODE_PUBLIC_READ};

/// Host-level protection applied after the interface is up
///
/// Driven by settings alone; no field of the merged document is consulted.
pub trait IntrusionGuard {
    fn apply(&self, jail: &JailSettings) -> Result<(), HardeningError>;
}

/// Writes a `jail.local` protecting sshd and restarts fail2ban
pub struct Fail2ban<'a, R> {
    runner: R,
    target: &'a dyn InstallTarget,
    ssh_port: u16,
    overwrite: bool,
}

impl<'a, R: CommandRunner> Fail2ban<'a, R> {
    pub fn new(runner: R, target: &'a dyn InstallTarget, ssh_port: u16) -> Self {
        Self {
            runner,
            target,
            ssh_port,
            overwrite: false,
        }
    }

    /// Replace an existing jail file instead of refusing
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    fn systemctl(&self, action: &str) -> Result<(), HardeningError> {
        self.runner
            .run_checked("systemctl", &[action, "fail2ban"])
            .map(|_| ())
            .map_err(HardeningError::IntrusionGuard)
    }
}

impl<R: CommandRunner> IntrusionGuard for Fail2ban<'_, R> {
    fn apply(&self, jail: &JailSettings) -> Result<(), HardeningError> {
        if self.target.exists(&jail.path) {
            if !self.overwrite {
                return Err(HardeningError::JailFile(InstallError::AlreadyExists {
                    path: jail.path.clone(),
                }));
            }
            tracing::warn!("Overwriting existing {}", jail.path.display());
        }

        let contents = render_jail(jail, self.ssh_port);
        self.target
            .persist(&jail.path, &contents, MODE_PUBLIC_READ)
            .map_err(HardeningError::JailFile)?;

        self.systemctl("enable")?;
        self.systemctl("restart")?;

        tracing::info!(
            "fail2ban protecting sshd on port {} (maxretry {}, bantime {}s)",
            self.ssh_port,
            jail.maxretry,
            jail.bantime
        );
        Ok(())
    }
}

/// Render the jail file for the given settings
pub fn render_jail(jail: &JailSettings, ssh_port: u16) -> String {
    format!(
        "[DEFAULT]\n\
         bantime = {bantime}\n\
         findtime = {findtime}\n\
         maxretry = {maxretry}\n\
         \n\
         [sshd]\n\
         enabled = true\n\
         port = {ssh_port}\n",
        bantime = jail.bantime,
        findtime = jail.findtime,
        maxretry = jail.maxretry,
        ssh_port = ssh_port,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::install::FileInstallTarget;
    use crate::system::command::testing::ScriptedRunner;
    use tempfile::TempDir;

    #[test]
    fn test_render_jail() {
        let jail = JailSettings {
            maxretry: 3,
            findtime: 300,
            bantime: 86400,
            ..JailSettings::default()
        };
        assert_eq!(
            render_jail(&jail, 2222),
            "[DEFAULT]\nbantime = 86400\nfindtime = 300\nmaxretry = 3\n\n\
             [sshd]\nenabled = true\nport = 2222\n"
        );
    }

    #[test]
    fn test_apply_writes_jail_and_restarts() {
        let dir = TempDir::new().unwrap();
        let jail = JailSettings {
            path: dir.path().join("jail.local"),
            ..JailSettings::default()
        };
        let runner = ScriptedRunner::new();

        Fail2ban::new(&runner, &FileInstallTarget, 22).apply(&jail).unwrap();

        let written = std::fs::read_to_string(&jail.path).unwrap();
        assert!(written.contains("[sshd]\nenabled = true\nport = 22\n"));
        assert_eq!(
            runner.calls(),
            vec!["systemctl enable fail2ban", "systemctl restart fail2ban"]
        );
    }

    #[test]
    fn test_restart_failure() {
        let dir = TempDir::new().unwrap();
        let jail = JailSettings {
            path: dir.path().join("jail.local"),
            ..JailSettings::default()
        };
        let runner =
            ScriptedRunner::new().fail("systemctl restart", 1, "Job for fail2ban.service failed");

        let result = Fail2ban::new(&runner, &FileInstallTarget, 22).apply(&jail);
        assert!(matches!(result, Err(HardeningError::IntrusionGuard(_))));
    }

    #[test]
    fn test_existing_jail_requires_overwrite() {
        let dir = TempDir::new().unwrap();
        let jail = JailSettings {
            path: dir.path().join("jail.local"),
            ..JailSettings::default()
        };
        std::fs::write(&jail.path, "[sshd]\nenabled = false\n").unwrap();
        let runner = ScriptedRunner::new();

        let result = Fail2ban::new(&runner, &FileInstallTarget, 22).apply(&jail);
        assert!(matches!(
            result,
            Err(HardeningError::JailFile(InstallError::AlreadyExists { .. }))
        ));
        assert_eq!(
            std::fs::read_to_string(&jail.path).unwrap(),
            "[sshd]\nenabled = false\n"
        );
        assert!(runner.calls().is_empty());

        Fail2ban::new(&runner, &FileInstallTarget, 22)
            .overwrite(true)
            .apply(&jail)
            .unwrap();
        assert!(std::fs::read_to_string(&jail.path)
            .unwrap()
            .contains("[sshd]\nenabled = true\n"));
    }
}
