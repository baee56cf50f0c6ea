use clap::Parser;
use image_namer::commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    image_namer::load_env();
    image_namer::init_tracing();

    Cli::parse().run().await
}
