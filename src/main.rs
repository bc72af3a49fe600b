//! wg-provision CLI
//!
//! Interactive installer for a WireGuard interface: paste a template, get a
//! key injected, the config installed and the interface brought up, with
//! optional firewall and fail2ban hardening.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use wg_provision::config::{validate_interface_name, ConfigDocument, ConfigMerger, WireGuardConfig};
use wg_provision::crypto::{x25519, FileKeyProvider, KeyProvider, X25519KeyProvider};
use wg_provision::error::ConfigError;
use wg_provision::input::Prompter;
use wg_provision::install::{DryRunInstallTarget, FileInstallTarget, InstallTarget};
use wg_provision::system::{
    Apt, CommandRunner, DryRunRunner, Fail2ban, InterfaceController, SystemRunner, Ufw, WgQuick,
};
use wg_provision::{ProvisionError, ProvisionReport, ProvisionSettings, Provisioner};

/// wg-provision - WireGuard interface installer
#[derive(Parser, Debug)]
#[command(name = "wg-provision")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON settings file (interface, config_dir, placeholder, ...)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge a template, install it and bring the interface up
    Install(InstallArgs),

    /// Merge a template and print the result without installing it
    Merge {
        /// Template file (default: read stdin up to the sentinel line)
        #[arg(long)]
        template: Option<PathBuf>,

        /// Private key to inject (default: generate one)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Print the value of a field; exits with 1 when it is absent
    Extract {
        /// Field name, e.g. ListenPort
        field: String,

        /// Config file (default: stdin)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Strictly validate a finished config file
    Check {
        file: PathBuf,
    },

    /// Bring the interface down
    Down {
        #[arg(short, long)]
        interface: Option<String>,

        /// Log the command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a new key pair
    Keygen,
}

#[derive(ClapArgs, Debug)]
struct InstallArgs {
    /// Template file (default: paste into the terminal)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Reuse an existing base64 private key instead of generating one
    #[arg(long)]
    private_key_file: Option<PathBuf>,

    /// Interface name (overrides the settings file)
    #[arg(short, long)]
    interface: Option<String>,

    /// Configure ufw without asking
    #[arg(long, conflicts_with = "no_firewall")]
    firewall: bool,

    /// Skip the firewall without asking
    #[arg(long)]
    no_firewall: bool,

    /// Install the fail2ban sshd jail without asking
    #[arg(long, conflicts_with = "no_intrusion_guard")]
    intrusion_guard: bool,

    /// Skip fail2ban without asking
    #[arg(long)]
    no_intrusion_guard: bool,

    /// Install wireguard (and ufw/fail2ban when enabled) with apt first
    #[arg(long)]
    install_packages: bool,

    /// Abort when the merged config fails validation
    #[arg(long)]
    strict: bool,

    /// Overwrite an existing interface config and fail2ban jail
    #[arg(long)]
    force: bool,

    /// Log every command and file write instead of performing it
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging; stdout is reserved for command output
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

fn run(args: Args) -> Result<ExitCode, ProvisionError> {
    let settings = match &args.settings {
        Some(path) => ProvisionSettings::from_file(path)?,
        None => ProvisionSettings::default(),
    };

    match args.command {
        Command::Install(install) => run_install(install, settings).map(|_| ExitCode::SUCCESS),
        Command::Merge { template, secret } => {
            run_merge(template.as_deref(), secret.as_deref(), &settings).map(|_| ExitCode::SUCCESS)
        }
        Command::Extract { field, file } => run_extract(&field, file.as_deref()),
        Command::Check { file } => run_check(&file).map(|_| ExitCode::SUCCESS),
        Command::Down { interface, dry_run } => {
            let mut settings = settings;
            if let Some(name) = interface {
                settings.interface = checked_interface(name)?;
            }
            if !dry_run {
                require_root()?;
            }
            let runner = command_runner(dry_run);
            WgQuick::new(runner, false).down(&settings.interface, &settings.config_path())?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Keygen => {
            let material = X25519KeyProvider.generate()?;
            println!("PrivateKey = {}", material.private_key());
            println!("PublicKey = {}", material.public_key());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_install(args: InstallArgs, mut settings: ProvisionSettings) -> Result<(), ProvisionError> {
    if let Some(name) = args.interface {
        settings.interface = checked_interface(name)?;
    }
    if !args.dry_run {
        require_root()?;
    }

    let mut prompter = Prompter::new(io::stdin().lock(), io::stderr());

    let template = match &args.template {
        Some(path) => read_template(path, &settings.sentinel)?,
        None => {
            prompter.say(&format!(
                "Paste the WireGuard configuration for {}. Use {} where the private key goes \
                 (or leave PrivateKey out), then finish with a line reading {}:",
                settings.interface, settings.placeholder, settings.sentinel
            ))?;
            prompter.read_until_sentinel(&settings.sentinel)?
        }
    };

    let firewall = decide(
        args.firewall,
        args.no_firewall,
        &mut prompter,
        "Configure the ufw firewall (SSH and the WireGuard ListenPort stay open)?",
    )?;
    let guard = decide(
        args.intrusion_guard,
        args.no_intrusion_guard,
        &mut prompter,
        "Protect SSH with a fail2ban jail?",
    )?;

    let runner = command_runner(args.dry_run);
    let target: &dyn InstallTarget = if args.dry_run {
        &DryRunInstallTarget
    } else {
        &FileInstallTarget
    };

    let file_keys;
    let keys: &dyn KeyProvider = match &args.private_key_file {
        Some(path) => {
            file_keys = FileKeyProvider::new(path);
            &file_keys
        }
        None => &X25519KeyProvider,
    };

    let wg = WgQuick::new(runner, settings.enable_on_boot);
    let ufw = Ufw::new(runner);
    let fail2ban = Fail2ban::new(runner, target, settings.ssh_port).overwrite(args.force);
    let apt = Apt::new(runner);

    let mut provisioner = Provisioner::new(&settings, keys, target, &wg)
        .strict(args.strict)
        .force(args.force);
    if firewall {
        provisioner = provisioner.with_firewall(&ufw);
    }
    if guard {
        provisioner = provisioner.with_intrusion_guard(&fail2ban);
    }
    if args.install_packages {
        provisioner = provisioner.with_packages(&apt);
    }

    let report = provisioner.run(&template)?;
    print_report(&report, args.json)
}

fn run_merge(
    template: Option<&Path>,
    secret: Option<&str>,
    settings: &ProvisionSettings,
) -> Result<(), ProvisionError> {
    let document = match template {
        Some(path) => read_template(path, &settings.sentinel)?,
        None => Prompter::new(io::stdin().lock(), io::sink())
            .read_until_sentinel(&settings.sentinel)?,
    };

    // A supplied secret is injected as-is; only generated keys have a known public half
    let generated;
    let secret = match secret {
        Some(secret) if !secret.is_empty() => secret,
        _ => {
            generated = X25519KeyProvider.generate()?;
            tracing::info!("Generated key pair, public key {}", generated.public_key());
            generated.private_key()
        }
    };

    let merger = ConfigMerger::new(settings.placeholder.as_str(), settings.key_field.as_str());
    let merged = merger.merge_with_policy(&document, secret)?;
    tracing::info!("Injected key with {:?}", merged.policy);

    let mut stdout = io::stdout().lock();
    stdout.write_all(merged.document.to_text().as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn run_extract(field: &str, file: Option<&Path>) -> Result<ExitCode, ProvisionError> {
    let text = match file {
        Some(path) => read_file(path)?,
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };

    match ConfigDocument::from_text(&text, None).extract_field(field) {
        Some(value) => {
            println!("{}", value);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            tracing::debug!("{} not set", field);
            Ok(ExitCode::from(1))
        }
    }
}

fn run_check(file: &Path) -> Result<(), ProvisionError> {
    let config = WireGuardConfig::from_file(file)?;
    let listen_port = config
        .interface
        .listen_port
        .map(|port| port.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("{}: OK", file.display());
    println!("  public key:  {}", x25519::encode_key(&config.public_key()));
    println!("  addresses:   {}", config.interface.address.len());
    println!("  listen port: {}", listen_port);
    println!("  peers:       {}", config.peers.len());
    Ok(())
}

fn print_report(report: &ProvisionReport, json: bool) -> Result<(), ProvisionError> {
    if json {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        println!("{}", json);
        return Ok(());
    }

    println!("Interface {} is up.", report.interface);
    println!("  config:     {}", report.config_path.display());
    println!("  public key: {}", report.public_key);
    if let Some(port) = report.listen_port {
        println!("  listening:  UDP {}", port);
    }
    if report.firewall_applied {
        println!("  firewall:   enabled");
    }
    if report.intrusion_guard_applied {
        println!("  fail2ban:   sshd jail active");
    }
    println!("Share the public key with your peers.");
    Ok(())
}

/// Answer from the flags, or ask when neither was given
fn decide<R: io::BufRead, W: Write>(
    yes: bool,
    no: bool,
    prompter: &mut Prompter<R, W>,
    question: &str,
) -> Result<bool, ProvisionError> {
    if yes || no {
        return Ok(yes);
    }
    Ok(prompter.confirm(question, false)?)
}

fn command_runner(dry_run: bool) -> &'static dyn CommandRunner {
    if dry_run {
        &DryRunRunner
    } else {
        &SystemRunner
    }
}

fn checked_interface(name: String) -> Result<String, ProvisionError> {
    validate_interface_name(&name).map_err(|message| ConfigError::Settings {
        path: "--interface".to_string(),
        message,
    })?;
    Ok(name)
}

fn read_file(path: &Path) -> Result<String, ProvisionError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into()
        } else {
            ProvisionError::System(e)
        }
    })
}

fn read_template(path: &Path, sentinel: &str) -> Result<ConfigDocument, ProvisionError> {
    let text = read_file(path)?;
    Ok(ConfigDocument::from_text(&text, Some(sentinel)))
}

#[cfg(unix)]
fn require_root() -> Result<(), ProvisionError> {
    // SAFETY: geteuid has no preconditions and cannot fail
    let euid = unsafe { libc::geteuid() };
    if euid != 0 {
        return Err(ProvisionError::InsufficientPrivileges {
            message: format!("running as uid {}, root is required", euid),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn require_root() -> Result<(), ProvisionError> {
    Ok(())
}
