use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use rusty_eats_agent::{AgentRunner, BrowserAgent};
use rusty_eats_core::config::{Config, Transport};
use rusty_eats_gateway::GatewayState;

#[derive(Parser)]
#[command(
    name = "rusty-eats",
    about = "MCP server that searches Uber Eats menus and places orders with a browser agent",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    Serve {
        /// Transport to serve on: stdio or ws (default: from config / MCP_TRANSPORT)
        #[arg(long)]
        transport: Option<Transport>,

        /// Port for the ws transport (default: 18790)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration summary and whether a ws server is running
    Status,

    /// Validate configuration
    Check,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a specific config value by dotted path (e.g. server.port)
    Get { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // .env is optional
    let _ = dotenvy::dotenv();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides()?;

    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Serve { transport, port } => {
            let transport = transport.unwrap_or_else(|| config.transport());
            let port = port.unwrap_or_else(|| config.port());
            let bind = config.bind();

            let (warnings, errors) = config.validate();
            for warning in &warnings {
                tracing::warn!("{warning}");
            }
            if !errors.is_empty() {
                anyhow::bail!("Invalid configuration: {}", errors.join("; "));
            }

            tracing::info!(
                config = %config_path.display(),
                %transport,
                server = %config.server_name(),
                "Starting Rusty Eats MCP server"
            );

            let runner: Arc<dyn AgentRunner> = Arc::new(BrowserAgent::from_config(&config));
            let state = Arc::new(GatewayState::new(config, runner));

            match transport {
                Transport::Stdio => rusty_eats_gateway::serve_stdio(state).await?,
                Transport::Ws => rusty_eats_gateway::start_server(state, &bind, port).await?,
            }
        }
        Commands::Status => {
            println!("Rusty Eats v{}", env!("CARGO_PKG_VERSION"));
            println!("Config: {}", config_path.display());
            println!("Server name: {}", config.server_name());
            println!("Transport: {}", config.transport());
            println!("WebSocket: ws://{}:{}/mcp", config.bind(), config.port());
            println!("Model: {}", config.model());
            println!(
                "API key: {}",
                if config.api_key().is_some() { "configured" } else { "missing" }
            );
            println!("Headless browser: {}", config.browser().headless);

            let health_url = format!("http://{}:{}/health", config.bind(), config.port());
            match reqwest::get(&health_url).await {
                Ok(resp) if resp.status().is_success() => {
                    let body: serde_json::Value = resp.json().await.unwrap_or_default();
                    println!(
                        "Status: running ({} requests, {} active tasks)",
                        body["requests"], body["active_tasks"]
                    );
                }
                _ => println!("Status: no ws server running"),
            }
        }
        Commands::Check => {
            let (warnings, errors) = config.validate();
            for warning in &warnings {
                println!("warning: {warning}");
            }
            for error in &errors {
                println!("error: {error}");
            }
            if errors.is_empty() {
                println!("Configuration OK ({} warnings)", warnings.len());
            } else {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Get { key } => match config.get_path(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => {
                    eprintln!("Config key not set: {key}");
                    std::process::exit(1);
                }
            },
        },
    }

    Ok(())
}

/// Logs go to stderr or a file; stdout belongs to the stdio transport.
fn init_logging(config: &Config, verbose: bool) -> anyhow::Result<()> {
    let logging = config.logging.clone().unwrap_or_default();

    let level = if verbose {
        "debug"
    } else {
        logging.level.as_deref().unwrap_or("info")
    };
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    for directive in &logging.filters {
        filter = filter.add_directive(directive.parse()?);
    }

    let to_file = logging.output == "file";
    let writer = if to_file {
        let path = config.log_file();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| anyhow::anyhow!("Cannot open log file {}: {e}", path.display()))?;
        BoxMakeWriter::new(std::sync::Mutex::new(file))
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(!to_file);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
