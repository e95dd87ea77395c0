//! TCP accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::connection::serve_connection;
use crate::directory::ServerDirectory;

/// A bound listener plus the directory shared by every connection it accepts.
pub struct Server {
    listener: TcpListener,
    directory: Arc<ServerDirectory>,
}

impl Server {
    /// Bind to `config.bind`.
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(&config.bind)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.bind, e))?;
        Ok(Self::with_listener(listener, config))
    }

    pub fn with_listener(listener: TcpListener, config: ServerConfig) -> Self {
        Self {
            listener,
            directory: Arc::new(ServerDirectory::new(config)),
        }
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn directory(&self) -> Arc<ServerDirectory> {
        self.directory.clone()
    }

    /// Accept connections forever, one task each.
    ///
    /// A failed `accept` is logged and skipped; only the listener going away
    /// ends the loop.
    pub async fn run(self) -> anyhow::Result<()> {
        info!("listening on {}", self.local_addr()?);
        loop {
            let (stream, addr) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("accept failed: {}", e);
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!("{}: could not disable Nagle: {}", addr, e);
            }
            info!("connection from {}", addr);
            let directory = self.directory.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(directory, stream).await {
                    warn!("{}: connection ended with an error: {}", addr, e);
                }
            });
        }
    }
}
