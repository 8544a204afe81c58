use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};
use server::config::{ServerConfig, CONFIG_FILE_NAME, NAME, VERSION};
use server::error::WorldError;
use server::hub::Hub;
use server::network::NetworkServer;
use server::user::UserDirectory;
use server::world::{load_module, World, WorldState};

/// Main-method of the application.
/// Loads config, users and the game module, then runs the world update loop,
/// the TCP listener and the event hub until a scheduled shutdown.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Path to the configuration file
        #[clap(short, long, default_value = CONFIG_FILE_NAME)]
        config: PathBuf,
        /// Server IP address to bind to
        #[clap(short = 'H', long)]
        host: Option<String>,
        /// Server port to listen on
        #[clap(short, long)]
        port: Option<u16>,
        /// Game module to serve
        #[clap(short, long)]
        module: Option<String>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    info!("{} {}", NAME, VERSION);

    let mut config = load_config(&args.config);
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(module) = args.module {
        config.module = module;
    }

    let users = match UserDirectory::load(&config.users_dir) {
        Ok(users) => {
            info!("Users loaded: {}", users.len());
            users
        }
        Err(e) => {
            error!("{}", e);
            UserDirectory::new()
        }
    };

    if config.module.is_empty() {
        return Err(WorldError::NoModule.into());
    }
    let module = load_module(&config.module_path())?;
    info!("Module loaded: {}", module.data.id);

    let world = World::new(WorldState::import(&module.data));
    tokio::spawn(world.clone().run_updates(config.update_break));

    let mut hub = Hub::new(config.clone(), users, world).with_config_path(args.config);
    hub.start_scripts(&module.scripts);

    let network = NetworkServer::bind(&config.address(), config.client_queue).await?;
    let network = tokio::spawn(network.run(hub.sender()));

    tokio::select! {
        _ = hub.run() => {
            // The hub is gone; wait for the closing notices to reach clients
            if let Err(e) = network.await {
                error!("Listener task failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, exiting without saving");
        }
    }

    Ok(())
}

/// Loads the config file, writing defaults if there is none.
fn load_config(path: &Path) -> ServerConfig {
    if !path.exists() {
        let config = ServerConfig::default();
        match config.save(path) {
            Ok(()) => info!("Default config written: {}", path.display()),
            Err(e) => warn!("{}", e),
        }
        return config;
    }
    match ServerConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            warn!("{}, using defaults", e);
            ServerConfig::default()
        }
    }
}
