//! servicepath CLI - resolve typed outputs through a service catalog.

mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use servicepath_core::{Catalog, InputMap};
use servicepath_execution::Orchestrator;
use servicepath_loadtest::{LoadTestDriver, TracingObserver};
use servicepath_registry::{FunctionTable, ServiceRegistry};
use settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "servicepath")]
#[command(about = "Resolve typed outputs through a catalog of services", long_about = None)]
struct Cli {
    /// Service catalog (JSON)
    #[arg(long, short, global = true, default_value = "service_registry.json")]
    catalog: PathBuf,

    /// Settings file (JSON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log filter, e.g. `info` or `servicepath_resolver=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an output and print its value
    Resolve {
        /// Output type
        output: String,
        /// Input as key=value (JSON values are parsed)
        #[arg(long = "input", short, value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
        /// Retries after the first attempt
        #[arg(long)]
        tries: Option<usize>,
        /// Print the whole working set
        #[arg(long)]
        all: bool,
        /// Print stat records and paths used
        #[arg(long)]
        stats: bool,
    },
    /// Show the plan for an output without executing it
    Plan {
        /// Output type
        output: String,
        /// Input as key=value (JSON values are parsed)
        #[arg(long = "input", short, value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
    },
    /// Resolve an output repeatedly at a fixed rate
    LoadTest {
        /// Output type
        output: String,
        /// Input as key=value (JSON values are parsed)
        #[arg(long = "input", short, value_parser = parse_input)]
        inputs: Vec<(String, Value)>,
        /// Calls per second
        #[arg(long)]
        rate: Option<u32>,
        /// Seconds to run
        #[arg(long)]
        duration: Option<u32>,
        /// Failure threshold in milliseconds
        #[arg(long)]
        max_response_time: Option<u64>,
        /// Clear paused and ignored services before every call
        #[arg(long)]
        reset_breakers: bool,
        /// Print stat records and paths used
        #[arg(long)]
        stats: bool,
    },
    /// List catalog services
    Services {
        /// Only services producing this type
        #[arg(long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("Invalid log level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let settings = Settings::load(cli.settings.as_deref())?;
    let catalog_text = std::fs::read_to_string(&cli.catalog)
        .with_context(|| format!("Failed to read catalog {}", cli.catalog.display()))?;
    let catalog = Catalog::from_json_str(&catalog_text)
        .with_context(|| format!("Invalid catalog {}", cli.catalog.display()))?;
    info!("Loaded {} services from {}", catalog.len(), cli.catalog.display());

    let registry = ServiceRegistry::new(settings.registry.to_config());
    registry.setup(catalog, FunctionTable::new()).await?;
    let registry = Arc::new(registry);

    let orchestrator = Orchestrator::with_config(registry.clone(), settings.orchestrator.clone());
    for (key, data) in &settings.random_data {
        orchestrator.set_random_data(key.clone(), data.clone()).await;
    }

    match cli.command {
        Commands::Resolve { output, inputs, tries, all, stats } => {
            let inputs: InputMap = inputs.into_iter().collect();
            let max_tries = tries.unwrap_or(settings.orchestrator.max_tries);
            let result = orchestrator
                .get_and_execute_service_path(&inputs, &output, max_tries)
                .await;

            if all {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                let value = result.output_value(&output).unwrap_or(Value::Null);
                println!("{}", serde_json::to_string_pretty(&value)?);
            }

            if stats {
                print_stats(&orchestrator).await?;
            }
        }
        Commands::Plan { output, inputs } => {
            let available: Vec<String> = inputs.into_iter().map(|(key, _)| key).collect();
            let search = orchestrator.resolver().search(&available, &output).await;

            let nodes: Vec<Value> = search
                .path
                .nodes()
                .iter()
                .map(|node| {
                    json!({
                        "key": node.key(),
                        "name": node.service.name,
                        "type": node.service.kind.label(),
                        "weight": node.service.edge_weight(),
                        "inputs": node.inputs.iter().map(|i| i.source.clone()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            let report = json!({
                "output": output,
                "resolved": search.is_resolved(),
                "distance": search.distances.get(&output),
                "path": nodes,
                "near_misses": search.near_misses,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::LoadTest {
            output,
            inputs,
            rate,
            duration,
            max_response_time,
            reset_breakers,
            stats,
        } => {
            let inputs: InputMap = inputs.into_iter().collect();
            let mut config = settings.load_test.clone();
            if let Some(rate) = rate {
                config = config.with_rate(rate);
            }
            if let Some(duration) = duration {
                config = config.with_duration(duration);
            }
            if let Some(ms) = max_response_time {
                config = config.with_max_response_time(Duration::from_millis(ms));
            }
            if reset_breakers {
                config = config.with_reset_breakers(true);
            }

            let orchestrator = Arc::new(orchestrator);
            let driver = LoadTestDriver::new(orchestrator.clone());
            let summary = driver.run(&inputs, &output, &config, &TracingObserver).await;
            println!("{}", summary);

            if stats {
                print_stats(&orchestrator).await?;
            }
        }
        Commands::Services { output } => {
            let services = registry.services().await;
            let services = services
                .iter()
                .filter(|s| output.as_deref().map(|o| s.output == o).unwrap_or(true));

            for service in services {
                println!(
                    "  {} | {} | {} | {}{}",
                    service.key,
                    service.kind.label(),
                    service.name,
                    service.edge_weight(),
                    if service.enabled { "" } else { " (disabled)" },
                );
            }
        }
    }

    Ok(())
}

async fn print_stats(orchestrator: &Orchestrator) -> Result<()> {
    let report = json!({
        "service_stats": orchestrator.service_stats().await,
        "paths_used": orchestrator.service_paths_used().await,
    });
    eprintln!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("count=3"), Ok(("count".to_string(), json!(3))));
        assert_eq!(parse_input("switch=on"), Ok(("switch".to_string(), json!("on"))));
        assert_eq!(parse_input("tags=[\"a\"]"), Ok(("tags".to_string(), json!(["a"]))));
        assert!(parse_input("missing").is_err());
    }

    #[test]
    fn test_cli_parses_load_test() {
        let cli = Cli::parse_from([
            "servicepath",
            "--catalog",
            "catalog.json",
            "load-test",
            "ascii",
            "-i",
            "imageUrl=http://img/1.jpg",
            "--rate",
            "10",
        ]);

        assert_eq!(cli.catalog, PathBuf::from("catalog.json"));
        match cli.command {
            Commands::LoadTest { output, inputs, rate, .. } => {
                assert_eq!(output, "ascii");
                assert_eq!(inputs[0].0, "imageUrl");
                assert_eq!(rate, Some(10));
            }
            _ => panic!("expected load-test"),
        }
    }
}
