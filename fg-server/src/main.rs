use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fg_server::{
    config::Config,
    database::Database,
    routes::{build_router, AppState},
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Path to the YAML configuration file
    #[clap(long, default_value = "config.yml")]
    config: String,

    /// The address and optionally port to bind to, overriding the config
    #[clap(long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // Parse command line arguments
    let args = Args::parse();
    let config = Config::load_or_default(&args.config).context("Loading configuration")?;

    // initialize tracing
    // The guard has to live as long as the server, or buffered lines are lost
    let _guard = match &config.logging.directory {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, "access.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .json()
                .with_writer(non_blocking)
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(EnvFilter::from_default_env())
                .init();
            None
        }
    };

    // connect to the database
    let db = Database::connect(&config.database).context("Connecting to database")?;

    let app = build_router(AppState {
        db,
        api: Arc::new(config.api.clone()),
    });

    let address = args.address.unwrap_or(config.server.address.clone());
    // In development, use HTTP. In production, use HTTPS.
    if let Some(tls) = &config.server.tls {
        rustls::crypto::ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;
        let tls_config =
            axum_server::tls_rustls::RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .context("Loading TLS certificate")?;

        let addr = address.parse().context("Parsing listen address")?;
        tracing::info!("Listening on {} with TLS", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await
            .context("Starting TLS server")?;
    } else {
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Binding {}", address))?;
        tracing::info!("Listening on {}", address);
        axum::serve(listener, app).await?;
    }
    Ok(())
}
