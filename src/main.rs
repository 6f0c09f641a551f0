use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use adgenius::cli::{Args, Command};
use adgenius::config::{Config, Overrides};
use adgenius::engine::Orchestrator;
use adgenius::wire::GenerationInput;
use adgenius::{api, log, prompt, ux};

fn read_input(path: &Path) -> Result<GenerationInput> {
    let raw = fs_err::read_to_string(path)?;
    serde_json::from_str(&raw).with_context(|| format!("parsing generation input {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let (host, port) = match &args.command {
        Command::Serve { host, port } => (host.clone(), *port),
        _ => (None, None),
    };
    let overrides = Overrides {
        provider: args.provider.clone(),
        model: args.model.clone(),
        database: args.database.clone(),
        host,
        port,
    };
    let cfg = Config::load(args.config.as_deref(), &overrides)?;
    log::init_tracing(cfg.log_json, args.debug);

    match args.command {
        Command::Serve { .. } => {
            let orchestrator = Arc::new(Orchestrator::from_config(&cfg)?);
            tracing::info!(
                mode = if orchestrator.is_demo() { "demo" } else { "live" },
                backend = orchestrator.backend_name(),
                "Generation engine ready"
            );
            let app = api::router(orchestrator, Duration::from_secs(cfg.request_timeout_secs));
            api::serve(&cfg.host, cfg.port, app).await
        }
        Command::Generate { input, user, json } => {
            let input = read_input(&input)?;
            let orchestrator = Orchestrator::from_config(&cfg)?;

            let pb = ux::spinner(&format!("Generating copy with {}", orchestrator.backend_name()));
            let result = orchestrator.generate(Some(&user), &input).await;
            pb.finish_and_clear();
            let resp = result?;

            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else if let Some(platform) = input.platform {
                ux::show_variations(&resp, platform);
            }
            Ok(())
        }
        Command::Prompt { input } => {
            let input = read_input(&input)?;
            let Some(validated) = input.validated() else {
                bail!("input is missing a required field (product_name, product_description, platform, tone)");
            };
            ux::show_instruction(&prompt::build_request(&validated, None));
            Ok(())
        }
    }
}
