//! installtrack CLI entry point.

use clap::Parser;

use installtrack::cli::commands::{device, installation, scheduler};
use installtrack::cli::{AppContext, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = match AppContext::open(&cli.config_dir).await {
        Ok(ctx) => ctx,
        Err(err) => installtrack::cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Device(args) => device::execute(args, &ctx, cli.json).await,
        Commands::Installation(args) => installation::execute(args, &ctx, cli.json).await,
        Commands::Scheduler(args) => scheduler::execute(args, &ctx, cli.json).await,
    };

    ctx.close().await;
    if let Err(err) = result {
        installtrack::cli::handle_error(err, cli.json);
    }
}
