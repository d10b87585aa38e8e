//! Acceptor & shutdown coordination
//!
//! Runs the accept loop with a bounded wait so the shutdown flag is polled,
//! spawns one worker per connection, and on shutdown stops accepting,
//! gives workers a grace period, and has the MatchServer persist and say
//! goodbye to every session.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::handler::handle_connection;
use crate::server::{MatchServer, ServerCommand};
use crate::store::ItemStore;

/// Shared shutdown flag
///
/// Cloned into the accept loop and every connection reader.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown; observed within one poll interval
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bound listener plus everything needed to serve it
pub struct Acceptor {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    shutdown: ShutdownHandle,
}

impl Acceptor {
    /// Bind the listening socket; failure here is fatal for startup
    pub async fn bind(config: ServerConfig) -> Result<Self, AppError> {
        let listener = TcpListener::bind(&config.bind_addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: config.bind_addr.clone(),
                source,
            })?;
        Ok(Self {
            listener,
            config: Arc::new(config),
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve connections until the shutdown handle is triggered
    pub async fn run(self, store: ItemStore) -> Result<(), AppError> {
        let Acceptor {
            listener,
            config,
            shutdown,
        } = self;

        // Create MatchServer actor channel and start
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let server = MatchServer::new(store, config.welcome_message.clone(), cmd_rx);
        let actor = tokio::spawn(server.run());

        let mut workers = JoinSet::new();

        // Connection accept loop
        while !shutdown.is_triggered() {
            match timeout(config.accept_poll(), listener.accept()).await {
                Err(_elapsed) => {}
                Ok(Ok((stream, addr))) => {
                    info!("New connection from {}", addr);
                    let cmd_tx = cmd_tx.clone();
                    let config = Arc::clone(&config);
                    let shutdown = shutdown.clone();

                    // Spawn handler task for each connection
                    workers.spawn(async move {
                        if let Err(e) = handle_connection(stream, cmd_tx, config, shutdown).await {
                            error!("Connection handler error: {}", e);
                        }
                    });
                }
                Ok(Err(e)) => {
                    error!("Failed to accept connection: {}", e);
                }
            }

            while let Some(finished) = workers.try_join_next() {
                if let Err(e) = finished {
                    warn!("Connection task failed: {}", e);
                }
            }
        }

        info!("Shutdown requested, no longer accepting connections");
        drop(listener);

        // Give in-flight workers a moment to observe the flag
        sleep(config.shutdown_grace()).await;

        let (done_tx, done_rx) = oneshot::channel();
        cmd_tx
            .send(ServerCommand::Shutdown { done: done_tx })
            .await
            .map_err(|_| AppError::ChannelSend)?;
        if done_rx.await.is_err() {
            warn!("MatchServer stopped before confirming shutdown");
        }

        let drain = async { while workers.join_next().await.is_some() {} };
        if timeout(config.drain_timeout(), drain).await.is_err() {
            warn!("{} connection tasks still running, aborting them", workers.len());
            workers.shutdown().await;
        }

        drop(cmd_tx);
        if let Err(e) = actor.await {
            error!("MatchServer task failed: {}", e);
        }
        debug!("Acceptor stopped");

        Ok(())
    }
}
