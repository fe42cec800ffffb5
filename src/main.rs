use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use homelink::{Config, DeviceService, db};

/// Homelink - Device identity, binding and access routing for IoT homes
#[derive(Parser)]
#[command(name = "homelink", version, about)]
struct Cli {
    /// Path to the `SQLite` database
    #[arg(long, env = "HOMELINK_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Tenant domain
    #[arg(long, env = "HOMELINK_DOMAIN", global = true)]
    domain: Option<String>,

    /// Explicit TOML config file (defaults to ~/.config/homelink/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a device identity
    Register {
        #[arg(long)]
        sub_domain: String,
        #[arg(long)]
        device_id: String,
        /// Public key (required for masters)
        #[arg(long, default_value = "")]
        public_key: String,
        /// Register as a master device
        #[arg(long)]
        master: bool,
    },
    /// Remove a device identity
    Unregister {
        #[arg(long)]
        sub_domain: String,
        #[arg(long)]
        device_id: String,
    },
    /// Show a registered identity and its binding
    ShowDevice {
        #[arg(long)]
        sub_domain: String,
        #[arg(long)]
        device_id: String,
    },
    /// Create a home owned by a user
    CreateHome {
        #[arg(long)]
        uid: i64,
        #[arg(long)]
        name: String,
    },
    /// Add a user to a home
    AddMember {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        uid: i64,
        #[arg(long)]
        name: String,
    },
    /// Bind a registered device into a home
    Bind {
        #[arg(long)]
        sub_domain: String,
        #[arg(long)]
        device_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        hid: i64,
        /// Bind as a slave of this master did (omit to bind a master)
        #[arg(long)]
        master_did: Option<i64>,
    },
    /// Move a did onto a replacement device
    ChangeBinding {
        #[arg(long)]
        did: i64,
        #[arg(long)]
        sub_domain: String,
        #[arg(long)]
        device_id: String,
    },
    /// List devices placed in a home
    ListDevices {
        #[arg(long)]
        hid: i64,
    },
    /// Delete a device (masters take their slaves with them)
    DeleteDevice {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        did: i64,
    },
    /// Freeze or unfreeze a device
    FreezeDevice {
        #[arg(long)]
        did: i64,
        /// Make the device active again
        #[arg(long)]
        unfreeze: bool,
    },
    /// Rename an active device
    RenameDevice {
        #[arg(long)]
        did: i64,
        #[arg(long)]
        name: String,
    },
    /// List the homes a user belongs to
    ListHomes {
        #[arg(long)]
        uid: i64,
    },
    /// Rename an active home
    RenameHome {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        name: String,
    },
    /// Freeze or unfreeze a home
    FreezeHome {
        #[arg(long)]
        hid: i64,
        /// Make the home active again
        #[arg(long)]
        unfreeze: bool,
    },
    /// Delete a home with its devices and members
    DeleteHome {
        #[arg(long)]
        hid: i64,
    },
    /// List the members of a home
    ListMembers {
        #[arg(long)]
        hid: i64,
    },
    /// Rename a member
    RenameMember {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        uid: i64,
        #[arg(long)]
        name: String,
    },
    /// Freeze or unfreeze a member
    FreezeMember {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        uid: i64,
        /// Make the membership active again
        #[arg(long)]
        unfreeze: bool,
    },
    /// Remove a member from a home
    DeleteMember {
        #[arg(long)]
        hid: i64,
        #[arg(long)]
        uid: i64,
    },
    /// Resolve the endpoint a user reaches for a device
    AccessPoint {
        #[arg(long)]
        uid: i64,
        #[arg(long)]
        did: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,homelink=info",
        1 => "info,homelink=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load()?,
    };
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    config.ensure_data_dir()?;
    tracing::debug!(?config, "loaded configuration");

    let domain = cli
        .domain
        .or_else(|| config.default_domain.clone())
        .context("no domain given (use --domain or HOMELINK_DOMAIN)")?;

    let pool = db::init(&config.database_path, config.pool_size)?;
    let service = DeviceService::new(pool, &config)?;

    let output = execute(&service, &domain, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[allow(clippy::too_many_lines)]
fn execute(service: &DeviceService, domain: &str, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Register {
            sub_domain,
            device_id,
            public_key,
            master,
        } => {
            service
                .warehouse()
                .register(domain, &sub_domain, &device_id, &public_key, master)?;
            json!({ "registered": true })
        }
        Command::Unregister {
            sub_domain,
            device_id,
        } => {
            service.warehouse().delete(domain, &sub_domain, &device_id)?;
            json!({ "deleted": true })
        }
        Command::ShowDevice {
            sub_domain,
            device_id,
        } => {
            let identity = service.warehouse().get(domain, &sub_domain, &device_id)?;
            let binding = service
                .bindings()
                .get_binding_info(domain, &sub_domain, &device_id)?;
            json!({ "identity": identity, "binding": binding })
        }
        Command::CreateHome { uid, name } => {
            let hid = service.homes().create(domain, uid, &name)?;
            json!({ "hid": hid })
        }
        Command::AddMember { hid, uid, name } => {
            service.members().add_member(domain, &name, hid, uid)?;
            json!({ "hid": hid, "uid": uid })
        }
        Command::Bind {
            sub_domain,
            device_id,
            name,
            hid,
            master_did,
        } => {
            let did = service.bindings().binding(
                domain,
                &sub_domain,
                &device_id,
                &name,
                hid,
                master_did.unwrap_or(-1),
            )?;
            json!({ "did": did })
        }
        Command::ChangeBinding {
            did,
            sub_domain,
            device_id,
        } => {
            service
                .bindings()
                .change_binding(did, domain, &sub_domain, &device_id)?;
            json!({ "did": did })
        }
        Command::ListDevices { hid } => {
            serde_json::to_value(service.devices().get_all_devices(domain, hid)?)?
        }
        Command::DeleteDevice { hid, did } => {
            service.devices().delete_device(domain, hid, did)?;
            json!({ "deleted": did })
        }
        Command::FreezeDevice { did, unfreeze } => {
            if unfreeze {
                service.devices().enable(domain, did)?;
            } else {
                service.devices().disable(domain, did)?;
            }
            serde_json::to_value(service.devices().get(domain, did)?)?
        }
        Command::RenameDevice { did, name } => {
            service.devices().change_device_name(domain, did, &name)?;
            serde_json::to_value(service.devices().get(domain, did)?)?
        }
        Command::ListHomes { uid } => serde_json::to_value(service.homes().get_all_homes(domain, uid)?)?,
        Command::RenameHome { hid, name } => {
            service.homes().modify_name(domain, hid, &name)?;
            serde_json::to_value(service.homes().get(domain, hid)?)?
        }
        Command::FreezeHome { hid, unfreeze } => {
            if unfreeze {
                service.homes().enable(domain, hid)?;
            } else {
                service.homes().disable(domain, hid)?;
            }
            serde_json::to_value(service.homes().get(domain, hid)?)?
        }
        Command::DeleteHome { hid } => {
            service.homes().delete(domain, hid)?;
            json!({ "deleted": hid })
        }
        Command::ListMembers { hid } => {
            serde_json::to_value(service.members().get_all_members(domain, hid)?)?
        }
        Command::RenameMember { hid, uid, name } => {
            service.members().modify_name(domain, hid, uid, &name)?;
            serde_json::to_value(service.members().get(domain, hid, uid)?)?
        }
        Command::FreezeMember { hid, uid, unfreeze } => {
            if unfreeze {
                service.members().enable(domain, hid, uid)?;
            } else {
                service.members().disable(domain, hid, uid)?;
            }
            serde_json::to_value(service.members().get(domain, hid, uid)?)?
        }
        Command::DeleteMember { hid, uid } => {
            service.members().delete(domain, hid, uid)?;
            json!({ "hid": hid, "deleted": uid })
        }
        Command::AccessPoint { uid, did } => {
            serde_json::to_value(service.get_access_point(uid, domain, did)?)?
        }
    };
    Ok(output)
}
