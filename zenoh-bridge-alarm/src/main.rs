//! Zenoh bridge for alarm controllers.

use clap::Parser;

use zenoh_bridge_alarm::{BridgeArgs, BridgeRunner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = BridgeArgs::parse();
    let runner = BridgeRunner::from_args(&args)?;
    runner.run().await?;
    Ok(())
}
