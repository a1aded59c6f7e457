//! Listener loop and server lifecycle.

use super::handler::{handle_request, ServerContext};
use super::tls::create_tls_acceptor;
use crate::config::ServerConfig;
use crate::engine::Sham;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info};

/// A bound, not yet running, sham HTTP(S) server.
pub struct ShamServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    context: Arc<ServerContext>,
}

impl ShamServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &ServerConfig) -> Result<Self, anyhow::Error> {
        config.validate()?;

        let tls = match &config.listen.tls {
            Some(tls) => Some(create_tls_acceptor(&tls.cert_path, &tls.key_path)?),
            None => None,
        };

        let listener = TcpListener::bind((config.listen.host.as_str(), config.listen.port))
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Failed to bind {}:{}: {e}",
                    config.listen.host,
                    config.listen.port
                )
            })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, _) = broadcast::channel(16);
        let context = Arc::new(ServerContext {
            sham: Arc::new(Sham::with_default_reply(config.default_reply.clone())),
            shutdown_tx,
        });

        Ok(Self {
            listener,
            local_addr,
            tls,
            context,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URI clients should use, e.g. `http://127.0.0.1:41234`.
    pub fn uri(&self) -> String {
        base_uri(self.local_addr, self.tls.is_some())
    }

    /// The engine behind this server, for in-process setup and assertions.
    pub fn sham(&self) -> Arc<Sham> {
        Arc::clone(&self.context.sham)
    }

    /// Sender that stops the accept loop when signalled.
    pub fn shutdown_sender(&self) -> broadcast::Sender<()> {
        self.context.shutdown_tx.clone()
    }

    /// Serve until shutdown is signalled (via `$shutdown` or the sender).
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let mut shutdown_rx = self.context.shutdown_tx.subscribe();
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        info!("Sham listening on {}://{}", scheme, self.local_addr);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let context = Arc::clone(&self.context);
                            match &self.tls {
                                Some(acceptor) => {
                                    let acceptor = acceptor.clone();
                                    tokio::spawn(async move {
                                        match acceptor.accept(stream).await {
                                            Ok(tls_stream) => serve_connection(tls_stream, context).await,
                                            Err(e) => debug!("TLS handshake with {} failed: {}", addr, e),
                                        }
                                    });
                                }
                                None => {
                                    tokio::spawn(serve_connection(stream, context));
                                }
                            }
                        }
                        Err(e) => {
                            error!("Accept error on {}: {}", self.local_addr, e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Sham on {} shutting down", self.local_addr);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run on a background task.
    pub fn spawn(self) -> ShamHandle {
        let local_addr = self.local_addr;
        let uri = self.uri();
        let sham = self.sham();
        let shutdown_tx = self.shutdown_sender();
        let task = tokio::spawn(self.run());
        ShamHandle {
            local_addr,
            uri,
            sham,
            shutdown_tx,
            task,
        }
    }
}

/// Serve one connection, finishing in-flight requests on shutdown.
async fn serve_connection<S>(stream: S, context: Arc<ServerContext>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut shutdown_rx = context.shutdown_tx.subscribe();
    let io = TokioIo::new(stream);
    let service = service_fn(move |req| {
        let context = Arc::clone(&context);
        async move { handle_request(req, context).await }
    });

    let conn = http1::Builder::new().serve_connection(io, service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!("Connection error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            conn.as_mut().graceful_shutdown();
            if let Err(e) = conn.await {
                debug!("Connection error during shutdown: {}", e);
            }
        }
    }
}

fn base_uri(addr: SocketAddr, tls: bool) -> String {
    let scheme = if tls { "https" } else { "http" };
    let host = if addr.ip().is_unspecified() {
        "127.0.0.1".to_string()
    } else {
        addr.ip().to_string()
    };
    match addr {
        SocketAddr::V6(_) if !addr.ip().is_unspecified() => {
            format!("{scheme}://[{host}]:{}", addr.port())
        }
        _ => format!("{scheme}://{host}:{}", addr.port()),
    }
}

/// Handle to a server running on a background task.
pub struct ShamHandle {
    local_addr: SocketAddr,
    uri: String,
    sham: Arc<Sham>,
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<Result<(), anyhow::Error>>,
}

impl ShamHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn sham(&self) -> Arc<Sham> {
        Arc::clone(&self.sham)
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn close(self) -> Result<(), anyhow::Error> {
        // No receivers left means the loop already stopped
        let _ = self.shutdown_tx.send(());
        self.task.await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_uri() {
        assert_eq!(
            base_uri("0.0.0.0:8080".parse().unwrap(), false),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            base_uri("127.0.0.1:443".parse().unwrap(), true),
            "https://127.0.0.1:443"
        );
        assert_eq!(base_uri("[::1]:80".parse().unwrap(), false), "http://[::1]:80");
    }

    #[tokio::test]
    async fn test_bind_assigns_port() {
        let config = ServerConfig {
            listen: crate::config::ListenConfig {
                host: "127.0.0.1".into(),
                ..Default::default()
            },
            default_reply: None,
        };
        let server = ShamServer::bind(&config).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);

        let handle = server.spawn();
        assert!(handle.uri().starts_with("http://127.0.0.1:"));
        handle.close().await.unwrap();
    }
}
