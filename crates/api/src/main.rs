use std::process::ExitCode;

use clap::Parser;
use tradeflow_api::cli::{self, Cli};
use tradeflow_api::{AppContext, CommandEnvelope};
use tradeflow_infra::{init_tracing, ConfigLoader};

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let envelope = runtime.block_on(run(args));

    println!("{}", envelope.to_json());
    let code = u8::try_from(envelope.exit_code()).unwrap_or(1);
    Ok(ExitCode::from(code))
}

async fn run(args: Cli) -> CommandEnvelope {
    let loader = match &args.config {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = match loader.load() {
        Ok(config) => config,
        Err(err) => return CommandEnvelope::failure(&err),
    };

    // Held until the process exits so buffered file logs are flushed.
    let _guard = match init_tracing(&config.logging) {
        Ok(guard) => guard,
        Err(err) => return CommandEnvelope::failure(&err),
    };

    let ctx = match AppContext::new(config).await {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, "failed to open application context");
            return CommandEnvelope::failure(&err);
        }
    };

    cli::dispatch(&ctx, args.command, &args.actor).await
}
