//! Warden license tool
//!
//! Issuer side:
//!   warden keygen --out issuer.key
//!   warden issue --key issuer.key --product Widget --trial-days 30 --out widget.lic
//!
//! Machine side (paths and the trusted issuer key come from `warden.toml`):
//!   warden install widget.lic --user-name "Ada"
//!   warden validate --scope <uuid> --name Widget --version 1.2
//!   warden upgrade widget-pro.lic
//!   warden uninstall

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use warden_cli::{build_document, parse_date, read_secret_key, write_secret_key, IssueOptions, LicenseSummary};
use warden_crypto::{KeyPair, VerifyingKey};
use warden_license::{
    DeploymentManifest, DirectoryContainer, InstallSource, Installer, IssuerIdentity, LicenseDocument,
    LicenseEnvironment, LicenseProvider, TargetIdentity, UsageMode, UserIdentity, Validation,
    ValidationRequest, WardenConfig,
};
use warden_types::{ScopeId, Version};

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Issue, install and validate machine-bound licenses")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "warden.toml", global = true)]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an issuer keypair
    Keygen {
        /// Where to write the secret key
        #[arg(short, long, default_value = "issuer.key")]
        out: PathBuf,
    },

    /// Issue a signed license
    Issue(IssueArgs),

    /// Verify a license file and print its contents
    Inspect {
        file: PathBuf,

        /// Base64 public key to verify with; defaults to the configured issuer key
        #[arg(long)]
        public_key: Option<String>,
    },

    /// Install a license on this machine
    Install {
        /// A license file, or a directory of unlockable licenses
        source: PathBuf,

        /// Unlock code when installing from a directory
        #[arg(long)]
        unlock_code: Option<String>,

        /// Deployment manifest; defaults to one built from the configuration
        #[arg(long)]
        manifest: Option<PathBuf>,

        #[arg(long, default_value = "")]
        user_name: String,

        #[arg(long, default_value = "")]
        user_email: String,

        /// Replace the installed license, keeping its product and user details
        #[arg(long)]
        replace: bool,
    },

    /// Apply an upgrade license on top of the installed one
    Upgrade { file: PathBuf },

    /// Check whether a target may be used now
    Validate {
        /// Scope id of the target
        #[arg(long)]
        scope: ScopeId,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        version: String,

        #[arg(long, value_enum, default_value_t = Mode::Runtime)]
        mode: Mode,

        /// Execution domain for web-hosted targets
        #[arg(long)]
        domain: Option<String>,
    },

    /// Remove the installed license, keypair and manifest
    Uninstall,
}

#[derive(clap::Args, Debug)]
struct IssueArgs {
    /// Issuer secret key written by `keygen`
    #[arg(short, long, default_value = "issuer.key")]
    key: PathBuf,

    #[arg(short, long)]
    out: PathBuf,

    #[arg(long)]
    product: String,

    #[arg(long, default_value = "1.0")]
    version: String,

    #[arg(long)]
    uid: Option<String>,

    #[arg(long, default_value = "")]
    developer: String,

    #[arg(long, default_value = "")]
    issuer_name: String,

    #[arg(long, default_value = "")]
    issuer_email: String,

    #[arg(long, default_value = "")]
    issuer_url: String,

    #[arg(long, default_value = "")]
    user_name: String,

    #[arg(long, default_value = "")]
    user_email: String,

    /// Grant everything without constraints
    #[arg(long)]
    full: bool,

    /// Days of use counted from installation
    #[arg(long)]
    trial_days: Option<i32>,

    /// Expiry date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    expires: Option<String>,

    /// End of a beta period (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    beta_until: Option<String>,

    #[arg(long)]
    max_uses: Option<i64>,

    /// Allowed execution domain; may be repeated
    #[arg(long = "domain")]
    domains: Vec<String>,

    #[arg(long)]
    design_only: bool,

    /// Hardware token of the machine this license is bound to
    #[arg(long)]
    hardware_key: Option<String>,

    #[arg(long, default_value = "")]
    purchase_url: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    Design,
    Runtime,
}

impl From<Mode> for UsageMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Design => UsageMode::Design,
            Mode::Runtime => UsageMode::Runtime,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    match args.command {
        Command::Keygen { out } => keygen(&out),
        Command::Issue(issue_args) => issue(issue_args),
        Command::Inspect { file, public_key } => inspect(&args.config, &file, public_key.as_deref()),
        Command::Install {
            source,
            unlock_code,
            manifest,
            user_name,
            user_email,
            replace,
        } => {
            let user = UserIdentity {
                name: user_name,
                email: user_email,
                ..UserIdentity::default()
            };
            install(&args.config, &source, unlock_code.as_deref(), manifest.as_deref(), user, replace)
        }
        Command::Upgrade { file } => upgrade(&args.config, &file),
        Command::Validate {
            scope,
            name,
            version,
            mode,
            domain,
        } => {
            let version = Version::parse(&version).context("Invalid target version")?;
            let mut request = ValidationRequest::new(TargetIdentity::new(scope, name, version), mode.into());
            if let Some(domain) = domain {
                request = request.with_domain(domain);
            }
            validate(&args.config, &request)
        }
        Command::Uninstall => uninstall(&args.config),
    }
}

fn load_config(path: &Path) -> Result<WardenConfig> {
    if path.exists() {
        info!("Loading configuration from {:?}", path);
        WardenConfig::load(path).context("Failed to load configuration")
    } else {
        warn!("No configuration at {:?}, using defaults", path);
        Ok(WardenConfig::default())
    }
}

fn environment(config_path: &Path) -> Result<(WardenConfig, LicenseEnvironment)> {
    let config = load_config(config_path)?;
    let env = LicenseEnvironment::from_config(&config).context("Failed to set up license environment")?;
    Ok((config, env))
}

fn keygen(out: &Path) -> Result<()> {
    if out.exists() {
        bail!("{} already exists", out.display());
    }
    let pair = KeyPair::generate();
    write_secret_key(out, &pair.signing_key)?;
    info!("Issuer secret key written to {:?}", out);
    println!("issuer_public_key = \"{}\"", pair.verifying_key.to_base64());
    Ok(())
}

fn issue(args: IssueArgs) -> Result<()> {
    let key = read_secret_key(&args.key)?;
    let opts = IssueOptions {
        uid: args.uid,
        product: args.product,
        version: args.version,
        developer: args.developer,
        issuer: IssuerIdentity {
            name: args.issuer_name,
            email: args.issuer_email,
            url: args.issuer_url,
        },
        user: UserIdentity {
            name: args.user_name,
            email: args.user_email,
            ..UserIdentity::default()
        },
        full: args.full,
        trial_days: args.trial_days,
        expires: args.expires.as_deref().map(parse_date).transpose()?,
        beta_until: args.beta_until.as_deref().map(parse_date).transpose()?,
        max_uses: args.max_uses,
        domains: args.domains,
        design_only: args.design_only,
        hardware_key: args.hardware_key,
        purchase_url: args.purchase_url,
    };

    let doc = build_document(&opts, Utc::now())?;
    let bytes = doc.seal(&key).context("Failed to sign license")?;
    fs::write(&args.out, bytes).context("Failed to write license file")?;
    info!(uid = %doc.uid, "License written to {:?}", args.out);
    Ok(())
}

fn inspect(config_path: &Path, file: &Path, public_key: Option<&str>) -> Result<()> {
    let trusted = match public_key {
        Some(encoded) => VerifyingKey::from_base64(encoded).context("Invalid public key")?,
        None => load_config(config_path)?.issuer_key()?,
    };
    let bytes = fs::read(file).context("Failed to read license file")?;
    let doc = LicenseDocument::open(&bytes, &trusted)?;
    println!("{}", serde_json::to_string_pretty(&LicenseSummary::from(&doc))?);
    Ok(())
}

fn install(
    config_path: &Path,
    source: &Path,
    unlock_code: Option<&str>,
    manifest_path: Option<&Path>,
    user: UserIdentity,
    replace: bool,
) -> Result<()> {
    let (config, env) = environment(config_path)?;
    let installer = Installer::new(&env);

    if replace {
        let bytes = fs::read(source).context("Failed to read license file")?;
        let doc = installer.install_replacement(&bytes)?;
        println!("Replaced installed license with {}", doc.uid);
        return Ok(());
    }

    let manifest = match manifest_path {
        Some(path) => {
            let text = fs::read_to_string(path).context("Failed to read manifest")?;
            DeploymentManifest::from_toml_str(&text)?
        }
        None => DeploymentManifest {
            name: config.product.clone(),
            full_name: config.product.clone(),
            version: Version::zero(),
            publisher: String::new(),
            description: String::new(),
            data_folder: config.data_dir()?,
        },
    };

    let doc = if source.is_dir() {
        let container = DirectoryContainer::new(source);
        installer.install_or_rollback(
            InstallSource::Container {
                container: &container,
                unlock_code,
            },
            &manifest,
            user,
        )
    } else {
        let bytes = fs::read(source).context("Failed to read license file")?;
        installer.install_or_rollback(InstallSource::Document(&bytes), &manifest, user)
    }
    .context("Installation failed")?;

    println!("Installed license {} for {}", doc.uid, doc.product.short_name);
    Ok(())
}

fn upgrade(config_path: &Path, file: &Path) -> Result<()> {
    let (_, env) = environment(config_path)?;
    let bytes = fs::read(file).context("Failed to read upgrade file")?;
    let doc = Installer::new(&env).upgrade(&bytes)?;
    println!("Upgraded to license {} (from {})", doc.uid, doc.lineage_uid);
    Ok(())
}

fn validate(config_path: &Path, request: &ValidationRequest) -> Result<()> {
    let (_, env) = environment(config_path)?;
    match LicenseProvider::new(&env).validate(request, None)? {
        Validation::Granted(grant) => {
            println!("Granted by license {}", grant.uid);
            if let Some(volume) = grant.volume {
                println!("  volume:  {volume}");
            }
            if let Some(runtime) = grant.runtime {
                println!("  runtime: {} hours", runtime.num_hours());
            }
            for warning in &grant.warnings {
                println!("  warning: {warning}");
            }
            Ok(())
        }
        Validation::Denied { reason } => bail!("Denied: {reason}"),
    }
}

fn uninstall(config_path: &Path) -> Result<()> {
    let (_, env) = environment(config_path)?;
    Installer::new(&env).uninstall()?;
    println!("License removed");
    Ok(())
}
