mod cli;

use clap::Parser;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    if let Err(err) = Cli::parse().run().await {
        eprintln!("seedgate error: {:#}", err);
        std::process::exit(1);
    }
}
