use anyhow::{Context, Result};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use log::info;
use crate::adapters::gateway::Gateway;
use crate::core::clients::Clients;
use crate::core::deploy::Deployer;
use crate::core::train::Trainer;
use crate::core::invocation::{handle, InvocationEvent, StageDriver};
use crate::core::poller::Outcome;
use crate::utils::config::StageConfig;
use crate::utils::lib::*;

pub async fn run_cli_interface() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let event = read_event(args.event)
        .context("Failed to read invocation event")?;
    let gateway = Arc::new(Gateway::new(args.gateway));
    let clients = Clients {
        store: gateway.clone(),
        sessions: gateway.clone(),
        platform: gateway.clone(),
        metadata: gateway.clone(),
    };
    let driver: Box<dyn StageDriver> = match args.stage {
        StageKind::Train => Box::new(Trainer::new(clients)),
        StageKind::Deploy => Box::new(Deployer::new(clients)),
    };

    info!("Handling {:?} invocation for pipeline job {}", args.stage, event.job.id);
    let outcome = handle(driver.as_ref(), gateway.as_ref(), event.job, StageConfig::from_env())
        .await
        .context("Failed to complete invocation")?;

    match outcome {
        Outcome::Continue { token, .. } => println!("continue {}", token),
        Outcome::Succeeded { .. } => println!("succeeded"),
        Outcome::Failed(details) => println!("failed: {}", details.message),
    }
    Ok(())
}

fn read_event(path: Option<PathBuf>) -> Result<InvocationEvent> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event file {:?}", path))?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)
                .context("Failed to read event from stdin")?;
            raw
        }
    };
    serde_json::from_str(&raw).context("Event is not a pipeline job event")
}
