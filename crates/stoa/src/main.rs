//! Stoa server entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use stoa::bootstrap;
use stoa_middleware::identity::provider_from_config;
use stoa_middleware::Pipeline;
use stoa_server::Server;

/// Command-line arguments.
struct Args {
    /// Path to a configuration file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("stoa {}", stoa::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(2);
                }
            }
        }

        Self { config }
    }
}

fn print_help() {
    println!(
        r"Stoa - HTTP request pipeline

USAGE:
    stoa [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Configuration file (TOML or JSON, default: ./stoa.toml if present)
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    HOST, PORT             Listen address (default: 0.0.0.0:5000)
    CORS_ORIGIN            Allowed origins, comma separated (default: http://54.172.192.158)
    CORS_CREDENTIALS       Allow credentials (default: true)
    IDENTITY_MODE          jwt, remote or disabled (default: disabled)
    IDENTITY_JWT_KEY       Verification key for jwt mode
    IDENTITY_SECRET_KEY    Service secret for remote mode
    IDENTITY_VERIFY_URL    Verification endpoint for remote mode
    IDENTITY_TIMEOUT_MS    Identity verification timeout (default: 3000)
    LOG_LEVEL, RUST_LOG    Log filter (default: info)
    LOG_FORMAT             json or pretty (default: json)
    STOA__SECTION__KEY     Override any configuration key
"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = bootstrap::load_config(args.config.as_deref())
        .context("failed to load configuration")?;

    stoa_telemetry::init_telemetry(&bootstrap::telemetry_config(&config))
        .context("failed to initialize telemetry")?;

    tracing::info!(
        version = stoa::VERSION,
        service = %config.telemetry.service_name,
        environment = %config.telemetry.environment,
        "Starting stoa"
    );

    let provider =
        provider_from_config(&config.identity).context("failed to build identity provider")?;
    tracing::info!(
        provider = provider.name(),
        enabled = provider.enabled(),
        "Identity provider ready"
    );

    let routes = bootstrap::routes().context("failed to register routes")?;
    let pipeline = Arc::new(Pipeline::standard(&config, Arc::new(routes), provider));

    Server::from_config(&config, pipeline)
        .context("invalid server configuration")?
        .run()
        .await
        .context("server stopped with an error")?;

    Ok(())
}
