use clap::Parser;
use saconfig::Variant;
use sonosalerts::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sonosalerts::run(Variant::Doorbell, Args::parse()).await
}
