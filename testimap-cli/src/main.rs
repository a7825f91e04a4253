//! # testimap CLI
//!
//! Command-line interface for the testimap transcript publishing toolkit.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use testimap_core::ManifestKind;

#[derive(Parser)]
#[command(name = "testimap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "testimap.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build transcript manifests and cleaned HTML fragments
    Build,

    /// Print a manifest located through the configured sources
    Manifest {
        /// Which manifest to read
        #[arg(long, value_enum, default_value_t = KindArg::Full)]
        kind: KindArg,
    },

    /// List the transcript detail routes for static generation
    Routes,

    /// Run the search proxy
    Proxy {
        /// Server port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Upstream search endpoint (overrides config)
        #[arg(long, env = "SEARCH_UPSTREAM_URL")]
        upstream_url: Option<String>,

        /// Bearer credential for the upstream (overrides config)
        #[arg(long, env = "SEARCH_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Value of Access-Control-Allow-Origin (overrides config)
        #[arg(long, env = "CORS_ALLOW_ORIGIN")]
        allow_origin: Option<String>,
    },

    /// Compute map filter options from a tile directory
    MapConfig {
        /// Base map configuration (JSON)
        input: PathBuf,

        /// Tile directory containing metadata.json and z/x/y.json tiles
        tiles: PathBuf,

        /// Where to write the updated configuration
        output: PathBuf,
    },
}

#[derive(Copy, Clone, ValueEnum)]
pub enum KindArg {
    Full,
    Summary,
}

impl From<KindArg> for ManifestKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Full => ManifestKind::Full,
            KindArg::Summary => ManifestKind::Summary,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Build => commands::build_transcripts(&cli.config),
        Commands::Manifest { kind } => commands::show_manifest(&cli.config, kind.into()).await,
        Commands::Routes => commands::list_routes(&cli.config).await,
        Commands::Proxy {
            port,
            upstream_url,
            api_key,
            allow_origin,
        } => {
            let overrides = commands::ProxyOverrides {
                port,
                upstream_url,
                api_key,
                allow_origin,
            };
            commands::proxy_server(&cli.config, overrides).await
        }
        Commands::MapConfig {
            input,
            tiles,
            output,
        } => commands::map_config(&input, &tiles, &output),
    }
}
