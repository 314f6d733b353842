use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use cert_manager_webhook_yandex::{api, tls};
use cert_manager_webhook_yandex::config::{Config, SecretStoreKind};
use cert_manager_webhook_yandex::provider::Endpoints;
use cert_manager_webhook_yandex::secrets::{DisabledSecretStore, KubeSecretStore, SecretStore};
use cert_manager_webhook_yandex::solver::{Solver, YandexSolver};

#[derive(Parser, Debug)]
#[command(name = "cert-manager-webhook-yandex")]
#[command(about = "cert-manager DNS-01 webhook for Yandex Cloud DNS")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API group the webhook is registered under
    #[arg(long, env = "GROUP_NAME")]
    group_name: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Where secrets referenced by issuers are read from
    #[arg(long, value_enum)]
    secret_store: Option<SecretStoreKind>,

    /// PEM certificate chain to serve HTTPS with
    #[arg(long)]
    tls_cert_file: Option<PathBuf>,

    /// PEM private key matching --tls-cert-file
    #[arg(long)]
    tls_private_key_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logger init)
    let mut config = Config::load_or_default(args.config.as_ref())?;
    if let Some(group_name) = args.group_name {
        config.group_name = group_name;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(secret_store) = args.secret_store {
        config.secret_store = secret_store;
    }
    if let Some(cert) = args.tls_cert_file {
        config.server.tls_cert_file = Some(cert);
    }
    if let Some(key) = args.tls_private_key_file {
        config.server.tls_private_key_file = Some(key);
    }
    config.validate()?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    if let Some(path) = &args.config {
        info!("Loaded configuration from: {}", path.display());
    }

    let http = reqwest::Client::builder()
        .user_agent(concat!("cert-manager-webhook-yandex/", env!("CARGO_PKG_VERSION")))
        .timeout(config.server.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let secret_store: Arc<dyn SecretStore> = match config.secret_store {
        SecretStoreKind::Kubernetes => Arc::new(
            KubeSecretStore::try_default()
                .await
                .context("Failed to create Kubernetes client")?,
        ),
        SecretStoreKind::Disabled => Arc::new(DisabledSecretStore),
    };

    let solver = Arc::new(YandexSolver::new(http, Endpoints::default()));
    solver.initialize(secret_store).await?;
    info!("Solver {:?} registered under group {}", solver.name(), config.group_name);

    let app = api::create_router(config.group_name.clone(), solver);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        "Challenge endpoint: POST /apis/{}/v1alpha1/{{solver}}",
        config.group_name
    );

    match config.server.tls_files() {
        Some((cert, key)) => {
            let acceptor = tls::acceptor(cert, key).context("Failed to load TLS certificate")?;
            info!("Server listening on https://{}", addr);
            tls::serve(listener, acceptor, app).await?;
        }
        None => {
            warn!("No TLS certificate configured; the Kubernetes API aggregator needs TLS terminated in front of this server");
            info!("Server listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
