//! Line Counter CLI - operator commands against the running daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9640";

#[derive(Parser)]
#[command(name = "linecount")]
#[command(about = "Packaging line counter CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "LINECOUNT_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Look up a production order and configure the counter
    Setup {
        /// Order label (e.g. 2024-118, dashes match slashes)
        order: String,

        /// Units to produce
        target: u64,
    },

    /// Start counting and open the gate
    Start,

    /// Stop counting and close the session
    Stop,

    /// Pause counting
    Pause,

    /// Resume a paused run
    Resume,

    /// Record rejected units (raises the stop threshold)
    Breakage {
        quantity: u64,
    },

    /// Drive the gate directly
    Gate {
        #[arg(value_enum)]
        position: GatePosition,
    },

    /// Clear all session state (only while stopped)
    Reset,

    /// Show the current status
    Status {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum GatePosition {
    Open,
    Close,
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize, Tabled)]
struct SetupResult {
    order_id: i64,
    order_label: String,
    article: String,
    description: String,
    nominal_rate: u32,
    target: u64,
}

#[derive(Deserialize, Tabled)]
struct CommandResult {
    run_state: String,
    gate_state: String,
    current_count: u64,
    stop_threshold: u64,
}

#[derive(Deserialize)]
struct StatusResult {
    order_label: String,
    article: String,
    description: String,
    nominal_rate: u32,
    configured: bool,
    current_count: u64,
    target_count: u64,
    breakage_count: u64,
    run_state: String,
    gate_state: String,
    automatic_pause: bool,
    started_at: Option<String>,
    instant_rate: f64,
    average_rate: u64,
    estimated_completion: Option<String>,
    #[serde(default)]
    task_failures: Vec<TaskFailureRow>,
}

#[derive(Deserialize, Tabled)]
struct TaskFailureRow {
    task: String,
    count: u64,
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

/// Run a run-control command and print the resulting state
async fn run_command(
    url: &str,
    method: &str,
    params: serde_json::Value,
    done: &str,
) -> Result<()> {
    let result = call_rpc(url, method, params).await?;
    let state: CommandResult = serde_json::from_value(result)?;

    println!("{}", format!("✓ {}", done).green().bold());
    println!();
    println!("{}", Table::new(vec![state]));
    Ok(())
}

fn colored_run_state(state: &str) -> colored::ColoredString {
    match state {
        "COUNTING" => state.green().bold(),
        "PAUSED" => state.yellow().bold(),
        _ => state.red().bold(),
    }
}

fn print_status(status: &StatusResult) {
    println!("{}", "Line Status".cyan().bold());
    println!();

    if status.configured {
        println!(
            "  {} {} ({} - {})",
            "Order:".bold(),
            status.order_label,
            status.article,
            status.description
        );
        println!("  {} {} units/h", "Nominal rate:".bold(), status.nominal_rate);
    } else {
        println!("  {} {}", "Order:".bold(), "not configured".yellow());
    }

    let run_state = colored_run_state(&status.run_state);
    if status.automatic_pause {
        println!("  {} {} (scheduled)", "State:".bold(), run_state);
    } else {
        println!("  {} {}", "State:".bold(), run_state);
    }
    println!("  {} {}", "Gate:".bold(), status.gate_state);
    println!();
    println!(
        "  {} {} / {}",
        "Count:".bold(),
        status.current_count,
        status.target_count
    );
    println!("  {} {}", "Breakage:".bold(), status.breakage_count);
    println!(
        "  {} {:.0} units/h (average {})",
        "Rate:".bold(),
        status.instant_rate,
        status.average_rate
    );
    if let Some(started_at) = &status.started_at {
        println!("  {} {}", "Started:".bold(), started_at);
    }
    if let Some(eta) = &status.estimated_completion {
        println!("  {} {}", "ETA:".bold(), eta);
    }

    let failures: Vec<_> = status.task_failures.iter().filter(|f| f.count > 0).collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Background failures".red().bold());
        println!("{}", Table::new(failures));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let url = cli.rpc_url.as_str();

    match cli.command {
        Commands::Setup { order, target } => {
            let params = json!({
                "order_label": order,
                "target": target,
            });

            let result = call_rpc(url, "line.configure.v1", params).await?;
            let setup: SetupResult = serde_json::from_value(result)?;

            println!("{}", "✓ Order configured".green().bold());
            println!();
            println!("{}", Table::new(vec![setup]));
        }

        Commands::Start => run_command(url, "counting.start.v1", json!({}), "Counting started").await?,
        Commands::Stop => run_command(url, "counting.stop.v1", json!({}), "Counting stopped").await?,
        Commands::Pause => run_command(url, "counting.pause.v1", json!({}), "Counting paused").await?,
        Commands::Resume => {
            run_command(url, "counting.resume.v1", json!({}), "Counting resumed").await?
        }

        Commands::Breakage { quantity } => {
            let params = json!({ "quantity": quantity });
            let done = format!("{} units recorded as breakage", quantity);
            run_command(url, "counting.breakage.v1", params, &done).await?;
        }

        Commands::Gate { position } => {
            let open = matches!(position, GatePosition::Open);
            let done = if open { "Gate opened" } else { "Gate closed" };
            run_command(url, "gate.set.v1", json!({ "open": open }), done).await?;
        }

        Commands::Reset => run_command(url, "line.reset.v1", json!({}), "Line reset").await?,

        Commands::Status { json } => match call_rpc(url, "line.status.v1", json!({})).await {
            Ok(result) if json => {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }
            Ok(result) => {
                let status: StatusResult =
                    serde_json::from_value(result).context("Unexpected status payload")?;
                print_status(&status);
            }
            Err(e) => {
                println!("  {} {}", "RPC URL:".bold(), url);
                println!("  {} {}", "Status:".bold(), "ERROR".red());
                println!("  {} {}", "Error:".bold(), e);
            }
        },
    }

    Ok(())
}
