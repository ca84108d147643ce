use anyhow::Result;
use tracing::info;

use companion_memory::bootstrap;

#[tokio::main]
async fn main() -> Result<()> {
    let service = bootstrap().await?;

    service.cleanup().start().await;
    info!("Companion memory running, press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;

    service.shutdown().await;
    Ok(())
}
