//! Unix socket server for admin commands.
//!
//! Provides a local IPC interface for settling withdrawals and flushing
//! pending saves.

use crate::error::Result;
use crate::network::Network;
use crate::wallet::PendingWithdrawal;
use canopy_topology::NodeId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// Admin command sent over the socket.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    /// Mark a withdrawal as paid out
    CompleteWithdrawal { node_id: String, withdrawal_id: String },
    /// Mark a withdrawal as failed and refund it
    FailWithdrawal { node_id: String, withdrawal_id: String },
    /// List withdrawals awaiting an outcome
    ListPendingWithdrawals,
    /// Retry saves that did not reach storage
    Flush,
    /// Ping (health check)
    Ping,
}

/// Response from admin command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Withdrawals { items: Vec<PendingWithdrawal> },
    Pong,
}

/// Admin socket server.
pub struct AdminSocket {
    network: Arc<Network>,
    socket_path: PathBuf,
}

impl AdminSocket {
    /// Create a new admin socket server.
    pub fn new(network: Arc<Network>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            network,
            socket_path: socket_path.into(),
        }
    }

    /// Run the admin socket server.
    pub async fn run(&self) -> Result<()> {
        // Remove a stale socket file from a previous run
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Admin socket listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let network = Arc::clone(&self.network);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, network).await {
                            tracing::error!("Admin connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept admin connection: {}", e);
                }
            }
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

async fn handle_connection(stream: UnixStream, network: Arc<Network>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<AdminCommand>(&line) {
            Ok(cmd) => execute_command(cmd, &network),
            Err(e) => AdminResponse::Error {
                error: format!("Invalid command: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)? + "\n";
        writer.write_all(response_json.as_bytes()).await?;
        line.clear();
    }

    Ok(())
}

fn execute_command(cmd: AdminCommand, network: &Network) -> AdminResponse {
    match cmd {
        AdminCommand::CompleteWithdrawal {
            node_id,
            withdrawal_id,
        } => settle(network, &node_id, &withdrawal_id, true),

        AdminCommand::FailWithdrawal {
            node_id,
            withdrawal_id,
        } => settle(network, &node_id, &withdrawal_id, false),

        AdminCommand::ListPendingWithdrawals => AdminResponse::Withdrawals {
            items: network.pending_withdrawals(),
        },

        AdminCommand::Flush => match network.flush_pending() {
            Ok(flushed) => AdminResponse::Ok {
                message: format!("Flushed {} pending saves", flushed),
            },
            Err(e) => AdminResponse::Error {
                error: e.to_string(),
            },
        },

        AdminCommand::Ping => AdminResponse::Pong,
    }
}

fn settle(network: &Network, node_id: &str, withdrawal_id: &str, completed: bool) -> AdminResponse {
    let node = match NodeId::parse(node_id) {
        Ok(node) => node,
        Err(e) => {
            return AdminResponse::Error {
                error: e.to_string(),
            }
        }
    };
    let result = if completed {
        network.complete_withdrawal(&node, withdrawal_id)
    } else {
        network.fail_withdrawal(&node, withdrawal_id)
    };
    match result {
        Ok(record) => AdminResponse::Ok {
            message: format!("Withdrawal {} is {}", record.id, record.status),
        },
        Err(e) => AdminResponse::Error {
            error: e.to_string(),
        },
    }
}

/// Socket file name inside the data directory.
pub const SOCKET_FILE: &str = "admin.sock";

/// Default socket path for a data directory.
pub fn default_socket_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(SOCKET_FILE)
}
