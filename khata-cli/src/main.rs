use anyhow::Result;
use khata_cli::{app, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    app::run().await
}
