use clap::Parser;
use hotelchat::cli::{self, Cli, Commands, ConfigAction};
use hotelchat::config::{Config, LoggingConfig};
use hotelchat::logging;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(opts) => {
            let config = load(opts.config.as_deref())?;
            cli::run_chat(&config, &opts).await?;
        }
        Commands::Ask(opts) => {
            let config = load(opts.config.as_deref())?;
            cli::run_ask(&config, &opts.message).await?;
        }
        Commands::Search(opts) => {
            let config = load(opts.config.as_deref())?;
            cli::run_search(&config, &opts).await?;
        }
        Commands::Load(opts) => {
            let config = load(opts.config.as_deref())?;
            cli::run_load(&config, &opts).await?;
        }
        Commands::Config(opts) => match opts.action {
            ConfigAction::Show => {
                let config = load(opts.config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Validate => {
                load(opts.config.as_deref())?;
                info!("Configuration is valid");
                println!("Configuration is valid");
            }
            ConfigAction::Init => {
                logging::init(&LoggingConfig::default())?;
                let path = opts.config.as_deref().unwrap_or("hotelchat.json");
                Config::write_default(path)?;
                info!(path, "Configuration file created");
            }
        },
        Commands::Version => {
            println!("hotelchat {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Load configuration and install logging from it.
fn load(path: Option<&str>) -> anyhow::Result<Config> {
    let config = Config::load(path)?;
    logging::init(&config.logging)?;
    Ok(config)
}
