//! 发送一次 status 请求。

use lora_config::AppConfig;
use lora_gateway::{link_params, status_request};
use lora_radio::RadioLink;
use lora_telemetry::init_tracing;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let mut link = lora_radio::connect(&config.radio_addr)
        .await?
        .with_destination(config.radio_tx_address);
    link.initialize(&link_params(&config)).await?;

    let payload = status_request()?;
    link.transmit(&payload).await?;
    info!(
        target: "lora.radio",
        destination = config.radio_tx_address,
        payload = %String::from_utf8_lossy(&payload),
        "status_request_sent"
    );
    Ok(())
}
