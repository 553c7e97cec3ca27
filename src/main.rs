mod cli;
mod commands;
mod config;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands};
use std::io;
use std::path::PathBuf;
use std::time::Instant;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub config_path: PathBuf,
    pub cluster_path: PathBuf,
    pub prefix: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config_path: cli.config,
        cluster_path: cli.cluster,
        prefix: cli.prefix,
    };

    log::debug!("Invoked command {:?}", std::env::args().nth(1).unwrap_or_default());
    let started = Instant::now();
    let result = dispatch(&ctx, cli.command);
    let elapsed = started.elapsed().as_secs_f64();
    match &result {
        Ok(()) => log::info!("Finished in {elapsed:.2} seconds"),
        Err(_) => log::error!("Failed after {elapsed:.2} seconds"),
    }
    result
}

fn dispatch(ctx: &Context, command: Commands) -> Result<()> {
    match command {
        Commands::Init => commands::discover::init(ctx),
        Commands::Discover(args) => commands::discover::run(ctx, args),
        Commands::Compile(args) => commands::compile::run(ctx, args),
        Commands::Log(args) => commands::logs::run(ctx, args),
        Commands::Status => commands::status::run(ctx),
        Commands::Restart(args) => commands::restart::run(ctx, args),
        Commands::UpdateConfig(args) => commands::config::update(ctx, args),
        Commands::GetConfig(args) => commands::config::get(ctx, args),
        Commands::Distribute(args) => commands::distribute::run(ctx, args),
        Commands::RunApp(args) => commands::app::run(ctx, args),
        Commands::RunScript(args) => commands::script::run(ctx, args),
        Commands::Yarn(cmd) => commands::yarn::run(ctx, cmd),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "hades", &mut io::stdout());
            Ok(())
        }
    }
}
