//! CLI entry point.
//!
//! Parses arguments, sets up logging, composes the context via bootstrap and
//! dispatches to a handler.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing::debug;

use toolgate_cli::{
    Cli, CliConfig, CliError, Commands, ServersFile, bootstrap, handlers, init_logging,
    load_dotenv,
};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv_path = load_dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(path) = dotenv_path {
        debug!(path = %path.display(), "Loaded .env");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if matches!(command, Commands::Keygen) {
        handlers::keygen::execute();
        return Ok(());
    }

    let file = ServersFile::load(&cli.servers)?;
    let ctx = bootstrap(CliConfig::from_servers_file(file)).await?;

    let result = match command {
        Commands::Catalog { server, json } => {
            handlers::catalog::execute(&ctx, server.as_deref(), json).await
        }
        Commands::Status => handlers::status::execute(&ctx).await,
        Commands::Call {
            tool,
            args,
            credentials,
        } => handlers::call::execute(&ctx, &tool, args.as_deref(), &credentials).await,
        Commands::Keygen => Ok(()),
    };

    ctx.shutdown().await;
    result
}
