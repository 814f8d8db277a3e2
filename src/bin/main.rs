use std::path::PathBuf;

use callwire::operation::{self, CATALOG, Operation};
use callwire::{RequestBroker, load_settings};
use clap::{Parser, Subcommand};
use serde_json::Value;

/// Request/response exchanges over a persistent event channel
#[derive(Parser)]
#[command(name = "callwire")]
#[command(version)]
#[command(about = "Request/response exchanges over a persistent event channel")]
struct Cli {
    /// Config file to use instead of the user config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Perform one exchange and print the success payload as JSON
    Call {
        /// Outbound event name (e.g., create_project, fetch_logs)
        operation: String,

        /// JSON payload to send
        #[arg(long, default_value = "{}")]
        payload: String,

        /// Inbound event that settles the call successfully
        #[arg(long, requires = "error")]
        success: Option<String>,

        /// Inbound event that settles the call with a remote error
        #[arg(long, requires = "success")]
        error: Option<String>,

        /// Backend endpoint (overrides config and CALLWIRE_ENDPOINT)
        #[arg(long)]
        endpoint: Option<String>,

        /// Request timeout in milliseconds; 0 waits indefinitely
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// List the known operations and their outcome events
    Operations,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Operations => {
            for op in CATALOG {
                println!("{}\t{}\t{}", op.outbound, op.success, op.error);
            }
        }
        Commands::Call {
            operation,
            payload,
            success,
            error,
            endpoint,
            timeout_ms,
        } => {
            let events = match (success, error) {
                (Some(success), Some(error)) => (success, error),
                _ => match operation::lookup(&operation) {
                    Some(Operation { success, error, .. }) => {
                        (success.to_string(), error.to_string())
                    }
                    None => {
                        eprintln!(
                            "Error: unknown operation '{}'. Pass --success and --error, or see `callwire operations`.",
                            operation
                        );
                        std::process::exit(1);
                    }
                },
            };

            let payload: Value = serde_json::from_str(&payload).unwrap_or_else(|e| {
                eprintln!("Error: --payload is not valid JSON: {}", e);
                std::process::exit(1);
            });

            let mut settings = load_settings(cli.config.as_deref()).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });
            if let Some(endpoint) = endpoint {
                settings.endpoint = endpoint;
            }
            if let Some(timeout_ms) = timeout_ms {
                settings.request_timeout_ms = timeout_ms;
            }

            let broker = RequestBroker::from_settings(&settings).unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            });

            let connect = broker.channel().connect();
            let connected = match settings.request_timeout() {
                Some(limit) => tokio::time::timeout(limit, connect)
                    .await
                    .unwrap_or_else(|_| {
                        Err(callwire::ExchangeError::Timeout {
                            exchange: "connect".to_string(),
                            after: limit,
                        })
                    }),
                None => connect.await,
            };
            if let Err(e) = connected {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            let result: Result<Value, _> = broker
                .send(
                    &operation,
                    &payload,
                    &events.0,
                    &events.1,
                    broker.defaults(),
                )
                .await;
            broker.channel().disconnect();

            match result {
                Ok(value) => match serde_json::to_string_pretty(&value) {
                    Ok(text) => println!("{}", text),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}
