use clap::Parser;
use obs_sse_server::cli::{run_cli, Cli};

fn main() -> anyhow::Result<()> {
    run_cli(Cli::parse())
}
