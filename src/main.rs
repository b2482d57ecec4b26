//! Binary entry point. All boot logic lives in `startup::run`; this file
//! only hands off to it.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    openclaw_voice_gateway::startup::run().await
}
