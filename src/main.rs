use std::path::PathBuf;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tracing::{error, info};

mod config;
mod handlers;
mod llm;
mod state;
mod storage;
mod style;
#[cfg(test)]
mod testing;
mod utils;

use config::CONFIG;
use state::AppState;
use style::PlatformCatalog;
use utils::logging::init_logging;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogCommand {
    Print,
    Check(PathBuf),
}

fn catalog_usage() -> &'static str {
    "Usage: style_prompt_extractor [print-catalog | check-catalog --path <file>]"
}

fn parse_catalog_command(args: &[String]) -> anyhow::Result<Option<CatalogCommand>> {
    match args.get(1).map(|value| value.as_str()) {
        Some("print-catalog") => Ok(Some(CatalogCommand::Print)),
        Some("check-catalog") => {
            let mut path: Option<PathBuf> = None;
            let mut index = 2;
            while index < args.len() {
                match args[index].as_str() {
                    "--path" => {
                        index += 1;
                        let value = args
                            .get(index)
                            .ok_or_else(|| anyhow!("Missing value for --path"))?;
                        path = Some(PathBuf::from(value));
                    }
                    other => {
                        return Err(anyhow!("Unknown argument: {other}\n{}", catalog_usage()));
                    }
                }
                index += 1;
            }
            let path = path.unwrap_or_else(|| CONFIG.platform_catalog_path.clone());
            Ok(Some(CatalogCommand::Check(path)))
        }
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", catalog_usage())),
        None => Ok(None),
    }
}

fn run_catalog_command(command: CatalogCommand) -> anyhow::Result<()> {
    match command {
        CatalogCommand::Print => {
            let rendered = serde_json::to_string_pretty(&CONFIG.platform_catalog)?;
            println!("{rendered}");
        }
        CatalogCommand::Check(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let catalog: PlatformCatalog = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            catalog
                .validate()
                .with_context(|| format!("Invalid catalog {}", path.display()))?;
            println!(
                "Catalog v{} at {} is valid ({} platforms)",
                catalog.version,
                path.display(),
                catalog.len()
            );
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if let Some(command) = parse_catalog_command(&args)? {
        return run_catalog_command(command);
    }

    let _guards = init_logging();
    info!(
        "Starting style prompt extractor with catalog v{} ({} platforms, two_pass={})",
        CONFIG.platform_catalog.version,
        CONFIG.platform_catalog.len(),
        CONFIG.two_pass_classification
    );

    let state = AppState::from_config(&CONFIG);
    let router = handlers::build_router(state);

    let listener = TcpListener::bind(&CONFIG.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", CONFIG.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn no_arguments_starts_the_server() {
        assert_eq!(parse_catalog_command(&args(&["bin"])).unwrap(), None);
    }

    #[test]
    fn parses_catalog_commands() {
        assert_eq!(
            parse_catalog_command(&args(&["bin", "print-catalog"])).unwrap(),
            Some(CatalogCommand::Print)
        );
        assert_eq!(
            parse_catalog_command(&args(&["bin", "check-catalog", "--path", "custom.json"]))
                .unwrap(),
            Some(CatalogCommand::Check(PathBuf::from("custom.json")))
        );
        assert!(parse_catalog_command(&args(&["bin", "check-catalog", "--path"])).is_err());
        assert!(parse_catalog_command(&args(&["bin", "check-catalog", "--bogus"])).is_err());
        assert!(parse_catalog_command(&args(&["bin", "import-history"])).is_err());
    }
}
