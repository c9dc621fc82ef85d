use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

use crate::logger::RunnerLogger;

mod artifacts;
mod build;
mod config;
mod gdb;
mod inspect;
mod logger;
mod path;
mod project;
mod run;

/// Environment variable turning on strict mode for the test subcommand.
pub const RUNNER_STRICT_MODE: &str = "TRAPTEST_STRICT";

// —————————————————————————————— CLI Parsing ——————————————————————————————— //

#[derive(Parser)]
struct CliArgs {
    #[command(subcommand)]
    command: Subcommands,
}

#[derive(Subcommand)]
enum Subcommands {
    /// Run the trap delivery firmware on QEMU and inspect the watched cell
    Run(RunArgs),
    /// Run the test scenarios
    Test(TestArgs),
    /// Build the firmware image
    Build(BuildArgs),
    /// Start GDB and connect to a running instance
    Gdb(GdbArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long, action)]
    debug: bool,
    #[arg(long, action)]
    stop: bool,
    #[arg(short, long, action)]
    verbose: bool,
    #[arg(long, action)]
    /// Replace trap enablement with a no-op
    stub_enable: bool,
    #[arg(long)]
    /// Path to the configuration file to use
    config: Option<PathBuf>,
}

#[derive(Args)]
struct TestArgs {
    /// Only run tests whose name starts with the pattern
    pattern: Option<String>,
    #[arg(long, action)]
    /// Fail if some tests are skipped
    strict: bool,
    #[arg(short, long, action)]
    verbose: bool,
}

#[derive(Args)]
struct BuildArgs {
    #[arg(long)]
    /// Path to the configuration file to use
    config: Option<PathBuf>,
    #[arg(short, long, action)]
    verbose: bool,
}

#[derive(Args)]
struct GdbArgs {
    #[arg(long)]
    /// Path to the configuration file to use
    config: Option<PathBuf>,
}

// —————————————————————————————— Entry Point ——————————————————————————————— //

fn main() -> ExitCode {
    let args = CliArgs::parse();
    let verbose = match &args.command {
        Subcommands::Run(args) => args.verbose,
        Subcommands::Test(args) => args.verbose,
        Subcommands::Build(args) => args.verbose,
        Subcommands::Gdb(_) => false,
    };
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    RunnerLogger::init(level).unwrap();

    match args.command {
        Subcommands::Run(args) => run::run(&args),
        Subcommands::Test(mut args) => test::run_tests(&mut args),
        Subcommands::Build(args) => build::build(&args),
        Subcommands::Gdb(args) => gdb::gdb(&args),
    }
}
