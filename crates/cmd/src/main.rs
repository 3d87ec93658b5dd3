// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cmd::commands::put::PutSource;
use cmd::commands::{
    cat_command, exists_command, list_command, mkdir_command, put_command, rm_command,
    rmdir_command,
};
use cmd::common::UfsContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "ufs")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "UNIFS_CONFIG")]
    config: Option<PathBuf>,

    /// Session token, required for remote/ paths
    #[arg(long, global = true, env = "UNIFS_SESSION", hide_env_values = true)]
    session: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file to standard output
    Cat { path: String },
    /// Write a host file (or `-` for stdin) to a path
    Put { path: String, source: String },
    /// Delete a file
    Rm { path: String },
    /// List a directory
    Ls { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Remove an empty directory
    Rmdir { path: String },
    /// Print whether a path exists; exit status 1 when it does not
    Exists { path: String },
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let ctx = UfsContext::new(cli.config, cli.session);
    let router = ctx.open_router().await?;
    let session = ctx.session();
    let mut stdout = std::io::stdout().lock();

    let code = match &cli.command {
        Commands::Cat { path } => {
            cat_command(&router, session, path, &mut stdout).await?;
            ExitCode::SUCCESS
        }
        Commands::Put { path, source } => {
            put_command(&router, session, path, &PutSource::parse(source)).await?;
            ExitCode::SUCCESS
        }
        Commands::Rm { path } => {
            rm_command(&router, session, path).await?;
            ExitCode::SUCCESS
        }
        Commands::Ls { path } => {
            list_command(&router, session, path, &mut stdout).await?;
            ExitCode::SUCCESS
        }
        Commands::Mkdir { path } => {
            mkdir_command(&router, session, path).await?;
            ExitCode::SUCCESS
        }
        Commands::Rmdir { path } => {
            rmdir_command(&router, session, path).await?;
            ExitCode::SUCCESS
        }
        Commands::Exists { path } => {
            if exists_command(&router, session, path, &mut stdout).await? {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    };

    // Let read-through cache fills land before the runtime shuts down
    router.settle().await;
    Ok(code)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    diagnostics::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => Ok(code),
        Err(e) => {
            diagnostics::error!("ufs failed: {reason}", reason: format!("{e:#}"));
            Err(e)
        }
    }
}
