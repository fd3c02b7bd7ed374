// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use hiveot_api::CoreContext;
use hiveot_api::config::AuthnConfig;
use hiveot_api::error::AppError;
use hiveot_api::services::admin::AdminService;

mod cli;
mod logging;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let logger = logging::init()?;

    if let Err(e) = run() {
        log::error!("{}", e);
        logger.flush();
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = Cli::parse();
    let config = match &args.home {
        Some(home) => {
            let home = home.to_string_lossy().into_owned();
            AuthnConfig::from_lookup(|key| match key {
                "HIVEOT_HOME" => Some(home.clone()),
                _ => std::env::var(key).ok(),
            })
        }
        None => AuthnConfig::from_env(),
    };

    match &args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            println!("hiveot_core {}", hiveot_core::version());
        }
        Commands::Init => {
            let ctx = CoreContext::start(config)?;
            println!("initialized {}", ctx.config.home.display());
            print_clients(&ctx)?;
            ctx.stop();
        }
        Commands::Clients => {
            let ctx = CoreContext::open(config)?;
            print_clients(&ctx)?;
            ctx.stop();
        }
        Commands::AddConsumer {
            client_id,
            name,
            password,
        } => with_admin(config, |admin| {
            admin.add_consumer(client_id, name, password.as_deref())?;
            println!("consumer '{client_id}' added");
            Ok(())
        })?,
        Commands::AddAgent {
            client_id,
            name,
            pubkey_file,
        } => {
            let pub_key = match pubkey_file {
                Some(path) => Some(std::fs::read_to_string(path)?),
                None => None,
            };
            with_admin(config, |admin| {
                let token = admin.add_agent(client_id, name, pub_key.as_deref())?;
                println!("{token}");
                Ok(())
            })?
        }
        Commands::AddService { client_id, name } => with_admin(config, |admin| {
            let token = admin.add_service(client_id, name, None)?;
            println!("{token}");
            Ok(())
        })?,
        Commands::SetPassword {
            client_id,
            password,
        } => with_admin(config, |admin| {
            admin.set_client_password(client_id, password)?;
            println!("password of '{client_id}' changed");
            Ok(())
        })?,
        Commands::SetRole { client_id, role } => with_admin(config, |admin| {
            admin.set_client_role(client_id, role)?;
            println!("role of '{client_id}' set to {role}");
            Ok(())
        })?,
        Commands::Remove { client_id } => with_admin(config, |admin| {
            admin.remove_client(client_id)?;
            println!("client '{client_id}' removed");
            Ok(())
        })?,
        Commands::NewToken { client_id } => with_admin(config, |admin| {
            let token = admin.new_agent_token(client_id)?;
            println!("{token}");
            Ok(())
        })?,
    }

    Ok(())
}

/// Open the core, run `f` against the admin service, then close the core.
fn with_admin<F>(config: AuthnConfig, f: F) -> Result<()>
where
    F: FnOnce(&AdminService) -> Result<()>,
{
    let ctx = CoreContext::open(config)?;
    let admin = AdminService::new(ctx.clone());
    let result = f(&admin);
    ctx.stop();
    result
}

fn print_clients(ctx: &Arc<CoreContext>) -> Result<()> {
    println!("{:<20} {:<10} {:<10} NAME", "CLIENT", "TYPE", "ROLE");
    for profile in ctx.store.get_profiles() {
        let role = ctx.store.get_role(&profile.client_id).map_err(AppError::from)?;
        println!(
            "{:<20} {:<10} {:<10} {}",
            profile.client_id,
            profile.client_type.as_str(),
            role,
            profile.display_name
        );
    }
    Ok(())
}
