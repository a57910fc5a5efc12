use clap::Parser;
use std::path::PathBuf;
use streamgate::domain::config::GatewayConfig;
use streamgate::infra::registry::ProviderRegistry;
use streamgate::server::run_server;

#[derive(Parser)]
#[command(name = "streamgate")]
#[command(about = "Streaming file-transfer gateway - pluggable storage providers behind one HTTP surface")]
struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        env = "CONFIG_FILE",
        help = "Path to YAML configuration file"
    )]
    config_file: PathBuf,

    #[arg(long, env = "DEBUG", help = "Enable debug logging")]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.debug {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }

    tracing::info!("Loading configuration from: {}", cli.config_file.display());

    let config = match GatewayConfig::from_file(&cli.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!();
            eprintln!("Failed to load configuration file: {}", e);
            eprintln!();
            std::process::exit(1);
        }
    };

    // Resolve environment variables
    let resolved_config = match config.resolve_env_vars() {
        Ok(config) => config,
        Err(e) => {
            eprintln!();
            eprintln!("Configuration error: {}", e);
            eprintln!();
            std::process::exit(1);
        }
    };

    tracing::info!("Configuration loaded successfully");
    tracing::info!("  Providers: {}", resolved_config.providers.len());
    for provider in &resolved_config.providers {
        tracing::info!("    - {} ({})", provider.name, provider.kind);
    }
    tracing::info!("  Chunk size: {} bytes", resolved_config.chunk_size);

    // Initialize the provider registry
    let providers = match ProviderRegistry::from_config(&resolved_config).await {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!();
            eprintln!("Failed to initialize providers: {}", e);
            eprintln!();
            eprintln!("Please check your credentials and provider configurations.");
            std::process::exit(1);
        }
    };

    tracing::info!("Providers initialized successfully");

    // Test provider connectivity
    tracing::info!("Testing provider connectivity...");
    if let Err(e) = providers.check_all().await {
        eprintln!();
        eprintln!("Provider connectivity test failed: {}", e);
        eprintln!();
        eprintln!("Please verify:");
        eprintln!("  - Credentials are valid");
        eprintln!("  - Bucket names and root directories are correct");
        eprintln!("  - Network connectivity to the storage service");
        std::process::exit(1);
    }

    // Run server
    tracing::info!("Server starting on port {}", resolved_config.port);
    if let Err(e) = run_server(providers, &resolved_config).await {
        eprintln!();
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
