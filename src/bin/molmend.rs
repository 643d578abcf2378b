use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::IoParameters;
use commands::{clean, info};

#[derive(Parser, Debug)]
#[command(
    name = "molmend",
    about = "A command-line tool for repairing malformed Mol and SD file records before they reach a structure parser.",
    version,
    author,
    arg_required_else_help = true
)]
struct Cli {
    /// Input file path. When omitted, stdin is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    input: Option<PathBuf>,
    /// Output file path. When omitted, stdout is used.
    #[arg(short, long, value_name = "FILE", global = true)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe each record's name, version, and counts without modifying the stream.
    Info(info::InfoArgs),
    /// Rewrite malformed records into conforming CTAB text.
    Clean(clean::CleanArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let io_params = IoParameters {
        input: cli.input.clone(),
        output: cli.output.clone(),
    };

    match cli.command {
        Command::Info(args) => {
            info::run(&io_params, &args)?;
        }
        Command::Clean(args) => {
            commands::ensure_noninteractive_stdout("clean", &io_params)?;
            clean::run(&io_params, &args)?;
        }
    }

    Ok(())
}
