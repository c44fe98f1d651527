use lora_config::AppConfig;

// 环境变量为进程级共享状态，全部断言放在同一个测试中顺序执行。
#[test]
fn load_config_from_env() {
    let defaults = AppConfig::from_env().expect("defaults");
    assert_eq!(defaults.mqtt_topic, "targets/hits");
    assert_eq!(defaults.mqtt_qos, 1);
    assert_eq!(defaults.dedup_capacity, 10);
    assert_eq!(defaults.radio_frequency_hz, 915_000_000);
    assert_eq!(defaults.header_error_pause_ms, 2000);
    assert!(defaults.mqtt_username.is_none());

    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("LORA_MQTT_HOST", "broker.local");
        std::env::set_var("LORA_MQTT_TOPIC", "field/hits");
        std::env::set_var("LORA_DEDUP_CAPACITY", "32");
        std::env::set_var("LORA_PUBLISH_TIMEOUT_MS", "750");
        std::env::set_var("LORA_MQTT_USERNAME", "");
    }
    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.mqtt_host, "broker.local");
    assert_eq!(config.mqtt_topic, "field/hits");
    assert_eq!(config.dedup_capacity, 32);
    assert_eq!(config.publish_timeout_ms, 750);
    assert!(config.mqtt_username.is_none());

    unsafe {
        std::env::set_var("LORA_MQTT_QOS", "3");
    }
    let err = AppConfig::from_env().expect_err("qos out of range");
    assert_eq!(err.to_string(), "invalid value for LORA_MQTT_QOS: 3");

    // QoS 0 只有发送、没有确认
    unsafe {
        std::env::set_var("LORA_MQTT_QOS", "0");
    }
    let err = AppConfig::from_env().expect_err("qos 0 has no ack");
    assert_eq!(err.to_string(), "invalid value for LORA_MQTT_QOS: 0");

    unsafe {
        std::env::set_var("LORA_MQTT_QOS", "2");
    }
    assert_eq!(AppConfig::from_env().expect("qos 2").mqtt_qos, 2);

    unsafe {
        std::env::set_var("LORA_MQTT_QOS", "1");
        std::env::set_var("LORA_SPREADING_FACTOR", "seven");
    }
    let err = AppConfig::from_env().expect_err("not a number");
    assert_eq!(err.to_string(), "invalid value for LORA_SPREADING_FACTOR: seven");
}
