//! Convoy Agent - Entry Point
//!
//! The control plane of a self-hosted deployment setup. Tracks deployable
//! projects, triggers redeploys from source-control webhooks, and onboards
//! new nodes into the private overlay network.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use convoyd::app::options::{AppOptions, ServerOptions, StorageOptions, VpnOptions};
use convoyd::app::run::run;
use convoyd::logs::init_logging;
use convoyd::storage::layout::StorageLayout;
use convoyd::storage::settings::Settings;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!("convoyd {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    // An alternate base directory, mainly for running next to a dev checkout
    let layout = match cli_args.get("base-dir") {
        Some(base_dir) => StorageLayout::new(base_dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file; absent settings mean defaults
    let settings_file = layout.settings_file();
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file: {}", e);
                return;
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    if let Err(e) = init_logging(&settings.log_level) {
        println!("Failed to initialize logging: {e}");
    }

    let options = AppOptions {
        storage: StorageOptions { layout },
        server: ServerOptions {
            host: settings.server.host.clone(),
            port: settings.server.port,
        },
        vpn: VpnOptions {
            cert_bin: PathBuf::from(&settings.vpn.cert_bin),
            cert_groups: settings.vpn.cert_groups.clone(),
            sign_timeout: Duration::from_secs(settings.vpn.sign_timeout_secs),
        },
    };

    info!("Running Convoy agent with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the agent: {e}");
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
