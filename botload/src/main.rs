mod api;
mod cli;
mod config;
mod exit_codes;
mod logging;
mod output;
mod run;
mod run_error;
mod serve;

use clap::Parser;
use mimalloc::MiMalloc;

use crate::config::AppConfig;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let cli = match cli::Cli::try_parse() {
        Ok(v) => v,
        Err(err) => {
            use clap::error::ErrorKind;
            let _ = err.print();
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::Success.as_i32(),
                _ => ExitCode::InvalidInput.as_i32(),
            };
            std::process::exit(code);
        }
    };

    let code = match dispatch(cli).await {
        Ok(code) => code.as_i32(),
        Err(err) => {
            eprintln!("{err}");
            err.exit_code().as_i32()
        }
    };

    std::process::exit(code);
}

async fn dispatch(cli: cli::Cli) -> Result<ExitCode, RunError> {
    let mut cfg = AppConfig::load(cli.config.as_deref()).map_err(RunError::InvalidInput)?;
    if cli.log.is_some() {
        cfg.log = cli.log;
    }

    match cli.command {
        cli::Command::Serve(args) => {
            cfg.apply_serve(&args);
            cfg.validate().map_err(RunError::InvalidInput)?;
            logging::init(cfg.log.as_deref(), "info").map_err(RunError::InvalidInput)?;
            serve::serve(cfg).await
        }
        cli::Command::Run(args) => {
            cfg.apply_target(&args.target);
            cfg.validate().map_err(RunError::InvalidInput)?;
            // The progress bar owns stderr during a run; keep logs to warnings by default.
            logging::init(cfg.log.as_deref(), "warn").map_err(RunError::InvalidInput)?;
            run::run(args, cfg).await
        }
    }
}
