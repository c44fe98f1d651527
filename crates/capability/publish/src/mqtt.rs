use crate::{AckSender, EventPublisher, PublishError, PublishHandle};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// MQTT 发布器配置。
#[derive(Debug, Clone)]
pub struct MqttPublisherConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
}

enum Command {
    Publish {
        topic: String,
        payload: Vec<u8>,
        ack: AckSender,
    },
    Disconnect,
}

/// poll 任务转发给确认匹配任务的网络事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NetworkEvent {
    Sent(u16),
    Acked(u16),
    Disconnected,
}

/// MQTT 发布器。
///
/// `EventLoop` 由独立的 poll 任务持续驱动，`poll()` 从不被取消；
/// 确认匹配任务独占 `AsyncClient`：提交与确认发送端登记在同一步内完成，
/// `Outgoing::Publish(pkid)` 与提交队列按 FIFO 一一对应，不存在跨任务共享的待确认集合。
#[derive(Clone)]
pub struct MqttPublisher {
    commands: mpsc::Sender<Command>,
}

impl MqttPublisher {
    pub fn connect(
        config: MqttPublisherConfig,
    ) -> Result<(Self, tokio::task::JoinHandle<()>), PublishError> {
        if config.qos == 0 {
            return Err(PublishError::Client(
                "qos 0 has no broker acknowledgement".to_string(),
            ));
        }
        let client_id = format!("lora-gateway-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username, config.password) {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 10);
        let (commands, command_receiver) = mpsc::channel(10);
        let (events, event_receiver) = mpsc::channel(64);
        let qos = qos_from_u8(config.qos);
        let poller = tokio::spawn(poll_eventloop(eventloop, events));
        let handle = tokio::spawn(async move {
            match_acks(client, command_receiver, event_receiver, qos).await;
            poller.abort();
        });
        Ok((Self { commands }, handle))
    }

    /// 请求断开连接；网络任务在发出 DISCONNECT 后退出。
    pub async fn disconnect(&self) -> Result<(), PublishError> {
        self.commands
            .send(Command::Disconnect)
            .await
            .map_err(|_| PublishError::Client("network task stopped".to_string()))
    }
}

#[async_trait]
impl EventPublisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishHandle, PublishError> {
        let (ack, handle) = PublishHandle::channel();
        debug!(target: "lora.publish", topic = %topic, payload_size = payload.len(), "publish_submitted");
        self.commands
            .send(Command::Publish {
                topic: topic.to_string(),
                payload,
                ack,
            })
            .await
            .map_err(|_| PublishError::Client("network task stopped".to_string()))?;
        Ok(handle)
    }
}

async fn poll_eventloop(mut eventloop: EventLoop, events: mpsc::Sender<NetworkEvent>) {
    loop {
        let forward = match eventloop.poll().await {
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => Some(NetworkEvent::Sent(pkid)),
            Ok(Event::Incoming(Packet::PubAck(puback))) => Some(NetworkEvent::Acked(puback.pkid)),
            Ok(Event::Incoming(Packet::PubComp(pubcomp))) => {
                Some(NetworkEvent::Acked(pubcomp.pkid))
            }
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                info!(target: "lora.publish", code = ?connack.code, "mqtt_connected");
                None
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                info!(target: "lora.publish", "mqtt_disconnected");
                let _ = events.send(NetworkEvent::Disconnected).await;
                return;
            }
            Ok(_) => None,
            Err(err) => {
                if events.is_closed() {
                    return;
                }
                warn!(target: "lora.publish", "mqtt publish eventloop error: {}", err);
                tokio::time::sleep(Duration::from_secs(1)).await;
                None
            }
        };
        if let Some(event) = forward {
            if events.send(event).await.is_err() {
                return;
            }
        }
    }
}

async fn match_acks(
    client: AsyncClient,
    mut commands: mpsc::Receiver<Command>,
    mut events: mpsc::Receiver<NetworkEvent>,
    qos: QoS,
) {
    // 已提交、尚未分配 pkid 的确认发送端（FIFO）
    let mut awaiting_pkid: VecDeque<AckSender> = VecDeque::new();
    let mut in_flight: HashMap<u16, AckSender> = HashMap::new();
    let mut accepting = true;

    loop {
        tokio::select! {
            command = commands.recv(), if accepting => match command {
                Some(Command::Publish { topic, payload, ack }) => {
                    match client.try_publish(topic, qos, false, payload) {
                        Ok(()) => awaiting_pkid.push_back(ack),
                        Err(err) => ack.fail(PublishError::Client(err.to_string())),
                    }
                }
                Some(Command::Disconnect) | None => {
                    accepting = false;
                    if let Err(err) = client.try_disconnect() {
                        warn!(target: "lora.publish", "mqtt disconnect request failed: {}", err);
                        return;
                    }
                }
            },
            event = events.recv() => match event {
                Some(NetworkEvent::Sent(pkid)) => {
                    assign_pkid(&mut awaiting_pkid, &mut in_flight, pkid);
                }
                Some(NetworkEvent::Acked(pkid)) => resolve(&mut in_flight, pkid),
                Some(NetworkEvent::Disconnected) | None => return,
            },
        }
    }
}

fn assign_pkid(
    awaiting_pkid: &mut VecDeque<AckSender>,
    in_flight: &mut HashMap<u16, AckSender>,
    pkid: u16,
) {
    if in_flight.contains_key(&pkid) {
        debug!(target: "lora.publish", pkid, "publish_retransmitted");
    } else if let Some(ack) = awaiting_pkid.pop_front() {
        in_flight.insert(pkid, ack);
    } else {
        warn!(target: "lora.publish", pkid, "outgoing publish without submission");
    }
}

fn resolve(in_flight: &mut HashMap<u16, AckSender>, pkid: u16) {
    match in_flight.remove(&pkid) {
        Some(ack) => {
            if ack.is_abandoned() {
                debug!(target: "lora.publish", pkid, "late_ack_ignored");
            }
            ack.acknowledge();
        }
        None => {
            debug!(target: "lora.publish", pkid, "ack_for_unknown_pkid");
        }
    }
}

pub fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_defaults_to_at_least_once() {
        assert_eq!(qos_from_u8(0), QoS::AtMostOnce);
        assert_eq!(qos_from_u8(2), QoS::ExactlyOnce);
        assert_eq!(qos_from_u8(9), QoS::AtLeastOnce);
    }

    #[test]
    fn retransmitted_pkid_keeps_its_submission() {
        let mut awaiting = VecDeque::new();
        let mut in_flight = HashMap::new();
        let (first, mut first_handle) = PublishHandle::channel();
        let (second, _second_handle) = PublishHandle::channel();
        awaiting.push_back(first);
        awaiting.push_back(second);

        assign_pkid(&mut awaiting, &mut in_flight, 1);
        assign_pkid(&mut awaiting, &mut in_flight, 1);
        assert_eq!(awaiting.len(), 1);
        assert_eq!(in_flight.len(), 1);

        resolve(&mut in_flight, 1);
        assert!(matches!(first_handle.receiver.try_recv(), Ok(Ok(()))));
    }

    #[test]
    fn connect_rejects_qos_zero() {
        let config = MqttPublisherConfig {
            host: "127.0.0.1".to_string(),
            port: 1883,
            username: None,
            password: None,
            qos: 0,
        };
        assert!(matches!(
            MqttPublisher::connect(config),
            Err(PublishError::Client(_))
        ));
    }

    #[test]
    fn resolve_acknowledges_matching_pkid() {
        let mut in_flight = HashMap::new();
        let (ack, mut handle) = PublishHandle::channel();
        in_flight.insert(7, ack);
        resolve(&mut in_flight, 3);
        assert_eq!(in_flight.len(), 1);
        resolve(&mut in_flight, 7);
        assert!(in_flight.is_empty());
        assert!(matches!(handle.receiver.try_recv(), Ok(Ok(()))));
    }
}
