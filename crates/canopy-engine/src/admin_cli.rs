//! canopy-admin CLI tool
//!
//! Settles withdrawals and flushes pending saves on a running Canopy node.
//!
//! Usage:
//!   canopy-admin complete-withdrawal <node_id> <withdrawal_id>
//!   canopy-admin fail-withdrawal <node_id> <withdrawal_id>
//!   canopy-admin pending
//!   canopy-admin flush
//!   canopy-admin ping

use canopy_engine::admin_socket::default_socket_path;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

/// Admin command sent over the socket.
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum AdminCommand {
    CompleteWithdrawal { node_id: String, withdrawal_id: String },
    FailWithdrawal { node_id: String, withdrawal_id: String },
    ListPendingWithdrawals,
    Flush,
    Ping,
}

#[derive(Debug, Deserialize)]
struct PendingItem {
    node: String,
    id: String,
    amount: String,
    credited_amount: String,
    expected_clear_at_ms: u64,
}

/// Response from admin command.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum AdminResponse {
    Ok { message: String },
    Error { error: String },
    Withdrawals { items: Vec<PendingItem> },
    Pong,
}

fn print_usage() {
    eprintln!("canopy-admin - Administer a running Canopy node");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  canopy-admin complete-withdrawal <node_id> <withdrawal_id>  Mark a withdrawal paid");
    eprintln!("  canopy-admin fail-withdrawal <node_id> <withdrawal_id>      Fail and refund a withdrawal");
    eprintln!("  canopy-admin pending                                        List processing withdrawals");
    eprintln!("  canopy-admin flush                                          Retry pending saves");
    eprintln!("  canopy-admin ping                                           Check if daemon is running");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CANOPY_SOCKET    Path to admin socket (default: $CANOPY_DATA_DIR/admin.sock)");
    eprintln!("  CANOPY_DATA_DIR  Node data directory (default: ./canopy-data)");
}

fn get_socket_path() -> PathBuf {
    std::env::var("CANOPY_SOCKET").map(PathBuf::from).unwrap_or_else(|_| {
        let data_dir = std::env::var("CANOPY_DATA_DIR").unwrap_or_else(|_| "./canopy-data".into());
        default_socket_path(data_dir)
    })
}

fn send_command(cmd: AdminCommand) -> Result<AdminResponse, String> {
    let socket_path = get_socket_path();

    let mut stream = UnixStream::connect(&socket_path).map_err(|e| {
        format!(
            "Failed to connect to canopy-node at {:?}: {}\n\
             Is the canopy-node running?",
            socket_path, e
        )
    })?;

    // Send command
    let cmd_json = serde_json::to_string(&cmd).map_err(|e| e.to_string())?;
    writeln!(stream, "{}", cmd_json).map_err(|e| e.to_string())?;

    // Read response
    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader
        .read_line(&mut response_line)
        .map_err(|e| e.to_string())?;

    serde_json::from_str(&response_line).map_err(|e| format!("Invalid response: {}", e))
}

/// Node and withdrawal ids for the settle commands.
fn settle_args(args: &[String], name: &str) -> (String, String) {
    if args.len() < 4 {
        eprintln!("Error: {} requires <node_id> and <withdrawal_id>", name);
        std::process::exit(1);
    }
    (args[2].clone(), args[3].clone())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let cmd = match args[1].as_str() {
        "complete-withdrawal" => {
            let (node_id, withdrawal_id) = settle_args(&args, "complete-withdrawal");
            AdminCommand::CompleteWithdrawal {
                node_id,
                withdrawal_id,
            }
        }
        "fail-withdrawal" => {
            let (node_id, withdrawal_id) = settle_args(&args, "fail-withdrawal");
            AdminCommand::FailWithdrawal {
                node_id,
                withdrawal_id,
            }
        }
        "pending" => AdminCommand::ListPendingWithdrawals,
        "flush" => AdminCommand::Flush,
        "ping" => AdminCommand::Ping,
        "-h" | "--help" | "help" => {
            print_usage();
            std::process::exit(0);
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            std::process::exit(1);
        }
    };

    match send_command(cmd) {
        Ok(response) => match response {
            AdminResponse::Ok { message } => {
                println!("{}", message);
            }
            AdminResponse::Error { error } => {
                eprintln!("Error: {}", error);
                std::process::exit(1);
            }
            AdminResponse::Withdrawals { items } => {
                if items.is_empty() {
                    println!("(none)");
                } else {
                    for item in items {
                        println!(
                            "{}  {}  amount {}  credited {}  clears at {}",
                            item.id,
                            item.node,
                            item.amount,
                            item.credited_amount,
                            item.expected_clear_at_ms
                        );
                    }
                }
            }
            AdminResponse::Pong => {
                println!("pong - canopy-node is running");
            }
        },
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
