//! Sham HTTP test double.
//!
//! Usage:
//!   sham [--config sham.yaml] [--host 0.0.0.0] [--port 0] [--tls-cert cert.pem --tls-key key.pem]
//!
//! The bound base URI is printed on stdout once the listener is ready, so a
//! parent process can pick up an OS-assigned port.

use anyhow::Context;
use clap::Parser;
use sham_server::config::{ServerConfig, TlsConfig};
use sham_server::matcher::ResponseSpec;
use sham_server::server::ShamServer;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sham")]
#[command(author, version, about = "Programmable HTTP test double")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "SHAM_CONFIG")]
    config: Option<String>,

    /// Address to bind
    #[arg(long, env = "SHAM_HOST")]
    host: Option<String>,

    /// Port to bind (0 picks a free port)
    #[arg(short, long, env = "SHAM_PORT")]
    port: Option<u16>,

    /// PEM certificate; enables HTTPS together with --tls-key
    #[arg(long, env = "SHAM_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<String>,

    /// PEM private key
    #[arg(long, env = "SHAM_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<String>,

    /// Reply for unmatched requests, as JSON: '{"status":503,"body":"down"}'
    #[arg(long, env = "SHAM_DEFAULT_REPLY")]
    default_reply: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "SHAM_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig, anyhow::Error> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)
                .with_context(|| format!("Failed to load config file '{path}'"))?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.listen.host = host;
        }
        if let Some(port) = self.port {
            config.listen.port = port;
        }
        if let (Some(cert_path), Some(key_path)) = (self.tls_cert, self.tls_key) {
            config.listen.tls = Some(TlsConfig {
                cert_path,
                key_path,
            });
        }
        if let Some(reply) = self.default_reply {
            let reply: ResponseSpec =
                serde_json::from_str(&reply).context("Invalid --default-reply JSON")?;
            config.default_reply = Some(reply);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&args.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.into_config()?;
    let server = ShamServer::bind(&config).await?;
    println!("{}", server.uri());

    let shutdown = server.shutdown_sender();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        let _ = shutdown.send(());
    });

    server.run().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(_) => {
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    tokio::signal::ctrl_c().await.ok();
}
