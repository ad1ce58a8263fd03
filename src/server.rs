use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::api::{create_router, raft_router, AppState};
use crate::cluster::ClusterService;
use crate::config::NodeConfig;
use crate::consensus::RaftNode;
use crate::error::{QuarryError, Result};
use crate::metrics::SearchMetrics;
use crate::persistence::BlobStore;
use crate::state_machine::SearchStateMachine;

/// A running cluster member: Raft core plus its two listeners.
pub struct QuarryNode {
    service: Arc<ClusterService>,
    http_addr: String,
    shutdown: watch::Sender<bool>,
    servers: Vec<JoinHandle<()>>,
}

impl QuarryNode {
    /// Bind the configured addresses and start the node
    pub async fn start(config: NodeConfig, blobs: Arc<dyn BlobStore>) -> Result<Self> {
        let raft_listener = TcpListener::bind(&config.raft_addr).await?;
        let http_listener = TcpListener::bind(&config.http_addr).await?;
        Self::start_with_listeners(config, blobs, raft_listener, http_listener).await
    }

    /// Start the node on already bound listeners.
    ///
    /// Bootstraps or joins the cluster according to `config` before
    /// returning.
    pub async fn start_with_listeners(
        config: NodeConfig,
        blobs: Arc<dyn BlobStore>,
        raft_listener: TcpListener,
        http_listener: TcpListener,
    ) -> Result<Self> {
        let machine = Arc::new(SearchStateMachine::new(blobs, config.search_workers));
        let node = RaftNode::start(&config, machine.clone()).await?;
        info!(node_id = config.node_id, "Raft node started");

        let metrics = Arc::new(
            SearchMetrics::new()
                .map_err(|e| QuarryError::Internal(format!("failed to create metrics: {}", e)))?,
        );
        let service = Arc::new(ClusterService::new(
            node.clone(),
            machine,
            config.clone(),
            metrics,
        ));

        let (shutdown, _) = watch::channel(false);
        let servers = vec![
            spawn_server("raft", raft_listener, raft_router(node.raft().clone()), &shutdown)?,
            spawn_server(
                "http",
                http_listener,
                create_router(AppState {
                    service: service.clone(),
                }),
                &shutdown,
            )?,
        ];

        let started = Self {
            service,
            http_addr: config.http_addr.clone(),
            shutdown,
            servers,
        };

        if config.bootstrap {
            started.service.bootstrap().await?;
        } else if let Some(join_addr) = &config.join_addr {
            started.service.join_cluster(join_addr).await?;
        }

        info!(node_id = config.node_id, "Quarry node is ready");
        Ok(started)
    }

    pub fn service(&self) -> &Arc<ClusterService> {
        &self.service
    }

    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Stop both listeners and the Raft core
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(true);
        for server in self.servers {
            if let Err(e) = server.await {
                error!("Server task failed: {}", e);
            }
        }
        self.service.node().shutdown().await
    }

    /// Run until `signal` resolves, then shut down
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> Result<()> {
        signal.await;
        info!("Received shutdown signal, gracefully shutting down");
        self.shutdown().await
    }
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    app: Router,
    shutdown: &watch::Sender<bool>,
) -> Result<JoinHandle<()>> {
    let addr: SocketAddr = listener.local_addr()?;
    let mut stop = shutdown.subscribe();
    info!(%addr, "{} server listening", name);

    Ok(tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop.wait_for(|stopped| *stopped).await;
            })
            .await;
        if let Err(e) = served {
            error!("{} server error: {}", name, e);
        }
    }))
}
