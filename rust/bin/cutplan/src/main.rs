//! `cutplan`: command-line front end for the planning backend.
//!
//! Loads an order the way the planning page does (combinations, filter
//! decision, table fetch) and prints the result.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use cutplan_client::{HttpPlanningApi, NoAuth, StaticToken, TokenSource};
use cutplan_core::PlannerConfig;

/// Cut-planning CLI.
#[derive(Parser, Debug)]
#[command(name = "cutplan", about = "Cut-planning CLI client")]
struct Cli {
    /// Path to config file (default: ~/.cutplan/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Output format.
    #[arg(long = "output", short = 'o', global = true, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the production-center routings of an order.
    Combinations {
        #[arg(long)]
        order: String,
    },

    /// Load an order's planning tables.
    Plan {
        #[arg(long)]
        order: String,
        #[arg(long, default_value = "")]
        season: String,
        #[arg(long, default_value = "")]
        style: String,
        #[arg(long, default_value = "")]
        color: String,
        /// Comma-separated size labels, e.g. XS,S,M.
        #[arg(long, value_delimiter = ',')]
        sizes: Vec<String>,
        /// Cutting room to filter by when the order has several routings.
        #[arg(long)]
        cutting_room: Option<String>,
        #[arg(long)]
        destination: Option<String>,
    },

    /// Write the default config file.
    Init,

    /// Show version.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_output = cli.output == OutputFormat::Json;

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(PlannerConfig::default_path);
    let config = PlannerConfig::load(&config_path)?;

    match cli.command {
        Commands::Combinations { order } => {
            let api = build_api(&config)?;
            commands::order::combinations(api.as_ref(), &config, &order, json_output).await?;
        }

        Commands::Plan {
            order,
            season,
            style,
            color,
            sizes,
            cutting_room,
            destination,
        } => {
            let api = build_api(&config)?;
            let request = commands::plan::PlanRequest {
                order,
                season,
                style,
                color,
                sizes,
                cutting_room,
                destination,
            };
            commands::plan::run(api, config, request, json_output).await?;
        }

        Commands::Init => {
            if config_path.exists() {
                anyhow::bail!("{} already exists.", config_path.display());
            }
            PlannerConfig::default().save(&config_path)?;
            println!("Config written to {}", config_path.display());
        }

        Commands::Version => {
            println!("cutplan v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn build_api(config: &PlannerConfig) -> anyhow::Result<Arc<HttpPlanningApi>> {
    if config.api_base_url.is_empty() {
        anyhow::bail!("No api_base_url set. Run `cutplan init` and edit the config file.");
    }
    let tokens: Arc<dyn TokenSource> = if config.token.is_empty() {
        Arc::new(NoAuth)
    } else {
        Arc::new(StaticToken::new(config.token.clone()))
    };
    Ok(Arc::new(HttpPlanningApi::new(config.api_base_url.clone(), tokens)))
}
