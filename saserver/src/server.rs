//! # HTTP listener
//!
//! Thin wrapper over axum: routers are merged in, `start` binds the port and
//! serves in the background until Ctrl+C, `wait` blocks until it stops.

use std::io;
use std::net::SocketAddr;

use axum::Router;
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tracing::{error, info, warn};

pub struct Server {
    name: String,
    http_port: u16,
    router: Router,
    local_addr: Option<SocketAddr>,
    join_handle: Option<JoinHandle<()>>,
}

impl Server {
    /// # Arguments
    ///
    /// * `name` - service name, used in logs
    /// * `http_port` - port listened on all interfaces (0 picks a free one)
    pub fn new(name: impl Into<String>, http_port: u16) -> Self {
        Self {
            name: name.into(),
            http_port,
            router: Router::new(),
            local_addr: None,
            join_handle: None,
        }
    }

    /// Merges `router` into the routes served.
    pub fn add_router(&mut self, router: Router) {
        self.router = std::mem::take(&mut self.router).merge(router);
    }

    /// Binds the port and starts serving.
    ///
    /// # Errors
    ///
    /// The bind error, so a busy port stops the service before it claims to run.
    pub async fn start(&mut self) -> io::Result<SocketAddr> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.http_port));
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server {} listening on http://{}", self.name, local_addr);

        let router = std::mem::take(&mut self.router);
        let name = self.name.clone();
        self.join_handle = Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await
            {
                error!("Server {} stopped: {}", name, e);
            }
        }));

        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Waits until the server stops.
    pub async fn wait(&mut self) {
        if let Some(h) = self.join_handle.take() {
            let _ = h.await;
        }
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, graceful shutdown"),
        Err(e) => {
            warn!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
