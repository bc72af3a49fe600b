//! External collaborators driven through system binaries
//!
//! - Command execution seam (command)
//! - Interface bring-up via wg-quick (interface)
//! - Firewall policy via ufw (firewall)
//! - Intrusion prevention via fail2ban (guard)
//! - Package installation via apt (packages)

pub mod command;
pub mod firewall;
pub mod guard;
pub mod interface;
pub mod packages;

pub use command::{CommandOutput, CommandRunner, DryRunRunner, SystemRunner};
pub use firewall::{FirewallPolicy, FirewallRules, Ufw, LISTEN_PORT_FIELD};
pub use guard::{render_jail, Fail2ban, IntrusionGuard};
pub use interface::{InterfaceController, WgQuick};
pub use packages::{Apt, PackageInstaller};
