use std::process::ExitCode;

use clap::{Parser, Subcommand};
use procurement_gateway::routing::template::resolve_path;
use procurement_gateway::routing::{load_route_table, RequestParams, RouteTable};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the procurement gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a running gateway's health check
    Health {
        #[arg(short, long, default_value = "http://localhost:8081")]
        url: String,

        #[arg(long, default_value = "/admin/health")]
        path: String,
    },
    /// Load a route table, list its routes and report duplicates
    CheckRoutes {
        /// File path or http(s) URL; the built-in table when omitted
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Resolve a backend path template offline
    ResolvePath {
        template: String,

        /// Request parameters as name=value
        params: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Health { url, path } => {
            let client = reqwest::Client::new();
            let res = client
                .get(format!("{}{}", url.trim_end_matches('/'), path))
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            println!("{} {}", status.as_u16(), body);
            Ok(exit_code(status.is_success()))
        }
        Commands::CheckRoutes { source } => {
            let table = match load_route_table(source.as_deref()).await {
                Ok(table) => table,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(ExitCode::FAILURE);
                }
            };
            print_routes(&table);
            for dup in table.duplicates() {
                eprintln!(
                    "Duplicate: entry {} repeats entry {} ({} {} {})",
                    dup.duplicate,
                    dup.first,
                    table.routes()[dup.first].dialect(),
                    table.routes()[dup.first].method(),
                    table.routes()[dup.first].path_pattern(),
                );
            }
            Ok(exit_code(table.duplicates().is_empty()))
        }
        Commands::ResolvePath { template, params } => {
            let mut request_params = RequestParams::new();
            for pair in &params {
                match pair.split_once('=') {
                    Some((name, value)) => request_params.add(name, value),
                    None => {
                        eprintln!("Error: expected name=value, got '{}'", pair);
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
            println!("{}", resolve_path(&template, Some(&request_params)));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_routes(table: &RouteTable) {
    for route in table.routes() {
        println!(
            "{:<10} {:<6} {:<45} -> {} {}",
            route.dialect(),
            route.method().as_str(),
            route.path_pattern(),
            route.backend_method(),
            route.backend_path(),
        );
    }
    println!("{} routes", table.len());
}

fn exit_code(ok: bool) -> ExitCode {
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
