//! System package installation

use super::command::CommandRunner;
use crate::error::HardeningError;

pub trait PackageInstaller {
    fn install(&self, packages: &[&str]) -> Result<(), HardeningError>;
}

/// Debian/Ubuntu `apt-get`
pub struct Apt<R> {
    runner: R,
}

impl<R: CommandRunner> Apt<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> PackageInstaller for Apt<R> {
    fn install(&self, packages: &[&str]) -> Result<(), HardeningError> {
        if packages.is_empty() {
            return Ok(());
        }

        tracing::info!("Installing packages: {}", packages.join(", "));
        self.runner
            .run_checked("apt-get", &["update", "-q"])
            .map_err(HardeningError::Packages)?;

        let mut args = vec!["install", "-y", "-q"];
        args.extend_from_slice(packages);
        self.runner
            .run_checked("apt-get", &args)
            .map_err(HardeningError::Packages)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::command::testing::ScriptedRunner;

    #[test]
    fn test_install_updates_first() {
        let runner = ScriptedRunner::new();
        Apt::new(&runner).install(&["wireguard", "ufw"]).unwrap();
        assert_eq!(
            runner.calls(),
            vec!["apt-get update -q", "apt-get install -y -q wireguard ufw"]
        );
    }

    #[test]
    fn test_nothing_to_install() {
        let runner = ScriptedRunner::new();
        Apt::new(&runner).install(&[]).unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_missing_apt() {
        let runner = ScriptedRunner::new().missing("apt-get");
        let result = Apt::new(&runner).install(&["wireguard"]);
        assert!(matches!(result, Err(HardeningError::Packages(_))));
    }
}
