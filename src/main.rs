use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use seda::cli::{run, AppCatalog, Cli};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    run(cli, &AppCatalog::new()).await
}
