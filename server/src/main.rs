use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_HOST, DEFAULT_LEVEL, DEFAULT_LEVELS_DIR};
use server::network::Server;
use std::path::PathBuf;

/// Main-method of the application.
/// Parses command-line arguments, sets up logging, then runs the world server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = DEFAULT_HOST)]
        host: String,
        /// Server port to listen on
        #[clap(short, long, env = "PORT", default_value = "3000")]
        port: u16,
        /// Directory containing <level>.json files
        #[clap(long, default_value = DEFAULT_LEVELS_DIR)]
        levels_dir: PathBuf,
        /// Level used when a client does not ask for one
        #[clap(long, default_value = DEFAULT_LEVEL)]
        default_level: String,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        levels_dir: args.levels_dir,
        default_level: args.default_level,
    };

    let server = Server::new(config);

    // Handle shutdown gracefully
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    };

    server.run(shutdown).await?;
    Ok(())
}
