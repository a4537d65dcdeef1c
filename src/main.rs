use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    portal_tracker_lib::run(portal_tracker_lib::Cli::parse()).await
}
