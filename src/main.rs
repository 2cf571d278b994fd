use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dockhand::config::Settings;
use dockhand::telemetry::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(version, about = "Git-backed compose deployments behind scoped access tokens")]
pub struct Cli {
    /// Path to the config file (defaults to ./dockhand.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the registry, secret and deployments
    #[arg(long, global = true, env = "DOCKHAND_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the control API server
    Serve {
        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (permissive CORS for a local dashboard)
        #[arg(long)]
        dev: bool,
    },
    /// Create the data directory and signing secret
    Init,
    /// Issue an access token for a deployment
    Token {
        /// Deployment id
        id: String,

        /// Scopes to grant (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        scopes: Vec<String>,

        /// Lifetime in seconds (defaults to the permanent token validity)
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        validity: Option<u64>,
    },
    /// List registered deployments
    List,
}

impl Cli {
    /// Resolve settings: config file and environment, then CLI flags.
    fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(dir) = &self.data_dir {
            settings.storage.data_dir = dir.clone();
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    let mut settings = cli.settings()?;

    match &cli.command {
        Commands::Serve { port, host, dev } => {
            if let Some(port) = port {
                settings.server.port = *port;
            }
            if let Some(host) = host {
                settings.server.host = host.clone();
            }
            cmd::cmd_serve(&settings, *dev).await?;
        }
        Commands::Init => cmd::cmd_init(&settings)?,
        Commands::Token {
            id,
            scopes,
            validity,
        } => cmd::cmd_token(&settings, id, scopes, *validity).await?,
        Commands::List => cmd::cmd_list(&settings).await?,
    }

    Ok(())
}
