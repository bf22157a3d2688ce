use anyhow::Result;
use clap::Parser;
use cuentas::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cuentas::logging::init(cli.verbose);
    cli.run().await
}
