//! LoRa 接收网关：射频帧去重后转发到 MQTT。

use lora_config::AppConfig;
use lora_dedup::RecencyFilter;
use lora_gateway::{ingest_config, link_params, publisher_config};
use lora_ingest::IngestLoop;
use lora_publish::MqttPublisher;
use lora_radio::RadioLink;
use lora_telemetry::{init_tracing, metrics};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在）
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    // 射频初始化失败为致命错误，直接退出
    let params = link_params(&config);
    let mut link = match lora_radio::connect(&config.radio_addr).await {
        Ok(link) => link,
        Err(err) => {
            error!(target: "lora.radio", addr = %config.radio_addr, error = %err, "radio_open_failed");
            return Err(err.into());
        }
    };
    if let Err(err) = link.initialize(&params).await {
        error!(target: "lora.radio", addr = %config.radio_addr, error = %err, "radio_init_failed");
        return Err(err.into());
    }

    let (publisher, network_task) = MqttPublisher::connect(publisher_config(&config))?;
    info!(
        "publish target: mqtt {}:{} topic={} qos={}",
        config.mqtt_host, config.mqtt_port, config.mqtt_topic, config.mqtt_qos
    );

    let filter = RecencyFilter::new(config.dedup_capacity);
    let mut ingest = IngestLoop::new(
        link,
        filter,
        Arc::new(publisher.clone()),
        ingest_config(&config),
    );

    let result = tokio::select! {
        result = ingest.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    };

    let _ = publisher.disconnect().await;
    if tokio::time::timeout(Duration::from_secs(2), network_task)
        .await
        .is_err()
    {
        warn!(target: "lora.publish", "mqtt network task did not stop in time");
    }
    info!(metrics = ?metrics().snapshot(), "gateway_stopped");

    if let Err(err) = result {
        error!(target: "lora.ingest", error = %err, "ingest_stopped");
        return Err(err.into());
    }
    Ok(())
}
