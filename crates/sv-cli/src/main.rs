use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use sv_core::EvaluationParams;
use tracing_subscriber::EnvFilter;

use sv_cli::commands::{batch, evaluate, input, shift};
use sv_cli::{Cli, Commands, Config, ParamOverrides};

/// Load config and layer the command-line overrides on top.
fn resolve_params(config_path: Option<&Path>, overrides: &ParamOverrides) -> Result<EvaluationParams> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut params = config.evaluation;
    overrides.apply(&mut params);
    Ok(params)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Evaluate {
            inputs,
            overrides,
            modules,
            json,
        }) => {
            let params = resolve_params(cli.config.as_deref(), overrides)?;
            let modules = input::select_modules(modules)?;
            let loaded = input::LoadedInputs::load(inputs)?;
            evaluate::run(
                &mut out,
                &loaded,
                &modules,
                &params,
                *json,
                chrono::Utc::now(),
            )?;
        }
        Some(Commands::Shift {
            ground_truth,
            estimated,
            overrides,
            json,
        }) => {
            let params = resolve_params(cli.config.as_deref(), overrides)?;
            let ground_truth = input::read_json(ground_truth)?;
            let estimated = input::read_json(estimated)?;
            shift::run(&mut out, &ground_truth, &estimated, &params, *json)?;
        }
        Some(Commands::Batch {
            manifest,
            overrides,
            modules,
            json,
        }) => {
            let params = resolve_params(cli.config.as_deref(), overrides)?;
            let modules = input::select_modules(modules)?;
            let recordings = batch::load_manifest(manifest)?;
            batch::run(
                &mut out,
                &recordings,
                &modules,
                &params,
                *json,
                chrono::Utc::now(),
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
