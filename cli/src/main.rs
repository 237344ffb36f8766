use clap::{Parser, Subcommand};
use cli::{daemon, install, Client};

#[derive(Parser)]
#[command(name = "roost")]
#[command(about = "Container-oriented process supervisor")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable debug mode
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List all services and their status
    List,
    /// Show overall system status
    Status,
    /// Restart a specific service
    Restart {
        /// Name of the service to restart
        service: String,
    },
    /// Install roost in the system PATH
    Install,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = roost_core::utils::init_tracing(if cli.debug { "debug" } else { "info" }) {
        eprintln!("could not initialize logging: {}", e);
    }
    println!("roost - version {}", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        None => daemon::run(cli.debug).await,
        Some(Commands::List) => Client::new().list().await,
        Some(Commands::Status) => Client::new().status().await,
        Some(Commands::Restart { service }) => Client::new().restart(service).await,
        Some(Commands::Install) => {
            install::auto_install();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
