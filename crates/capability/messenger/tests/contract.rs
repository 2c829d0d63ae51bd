//! 两种后端共用的行为测试。原生后端连接进程内通道服务；
//! MQTT 后端在设置 `HUB_TEST_MQTT_ADDR` 时运行。

use hub_broker::{BrokerConfig, ChannelBroker};
use hub_messenger::{
    MessageHandler, Messenger, MessengerError, MqttMessenger, NativeMessenger, NativeOptions,
};
use hub_server::Transport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const TIMEOUT: Duration = Duration::from_secs(5);

type Inbox = Arc<Mutex<Vec<(String, String)>>>;

fn recording_handler(inbox: &Inbox) -> MessageHandler {
    let inbox = inbox.clone();
    Arc::new(move |channel_id: &str, payload: &[u8]| {
        if let Ok(mut inbox) = inbox.lock() {
            inbox.push((
                channel_id.to_string(),
                String::from_utf8_lossy(payload).into_owned(),
            ));
        }
    })
}

async fn wait_for(inbox: &Inbox, expected: usize) -> Vec<(String, String)> {
    for _ in 0..100 {
        let snapshot = inbox.lock().expect("inbox").clone();
        if snapshot.len() >= expected {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {expected} messages, got {:?}", inbox.lock().expect("inbox"));
}

/// 订阅后发布能收到；断开再连接后订阅集合不变且继续生效。
async fn resubscribes_after_reconnect<M: Messenger>(
    messenger: &M,
    host_port: &str,
    client_id: &str,
) {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    messenger
        .subscribe("things.alpha", recording_handler(&inbox))
        .await
        .expect("buffered subscribe");
    messenger
        .connect(host_port, client_id, TIMEOUT)
        .await
        .expect("connect");
    messenger
        .subscribe("things.beta", recording_handler(&inbox))
        .await
        .expect("subscribe");
    tokio::time::sleep(Duration::from_millis(200)).await;

    messenger
        .publish("things.alpha", b"one")
        .await
        .expect("publish");
    assert_eq!(wait_for(&inbox, 1).await[0], ("things.alpha".to_string(), "one".to_string()));

    let before = messenger.subscriptions();
    messenger.disconnect().await;
    assert!(!messenger.is_connected());
    assert!(matches!(
        messenger.publish("things.alpha", b"offline").await,
        Err(MessengerError::NoConnection)
    ));
    messenger
        .connect(host_port, client_id, TIMEOUT)
        .await
        .expect("reconnect");
    assert_eq!(messenger.subscriptions(), before);
    tokio::time::sleep(Duration::from_millis(200)).await;

    messenger
        .publish("things.beta", b"two")
        .await
        .expect("publish after reconnect");
    let received = wait_for(&inbox, 2).await;
    assert_eq!(received[1], ("things.beta".to_string(), "two".to_string()));
    messenger.disconnect().await;
}

/// 重复订阅同一通道只保留最新 handler；取消订阅后不再投递。
async fn latest_subscription_wins<M: Messenger>(messenger: &M, host_port: &str, client_id: &str) {
    let first: Inbox = Arc::new(Mutex::new(Vec::new()));
    let second: Inbox = Arc::new(Mutex::new(Vec::new()));
    messenger
        .connect(host_port, client_id, TIMEOUT)
        .await
        .expect("connect");
    messenger
        .subscribe("things.gamma", recording_handler(&first))
        .await
        .expect("subscribe first");
    messenger
        .subscribe("things.gamma", recording_handler(&second))
        .await
        .expect("subscribe second");
    tokio::time::sleep(Duration::from_millis(200)).await;

    messenger
        .publish("things.gamma", b"hello")
        .await
        .expect("publish");
    wait_for(&second, 1).await;
    assert!(first.lock().expect("inbox").is_empty());

    messenger
        .unsubscribe("things.gamma")
        .await
        .expect("unsubscribe");
    assert!(messenger.subscriptions().is_empty());
    messenger.disconnect().await;
}

async fn start_broker() -> (ChannelBroker, String) {
    let broker = ChannelBroker::new(BrokerConfig {
        queue_depth: 10,
        clients: HashMap::from([("plugin1".to_string(), "secret".to_string())]),
    });
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = broker.start(listener, Transport::Plain).expect("start");
    (broker, addr.to_string())
}

fn native() -> NativeMessenger {
    NativeMessenger::new(NativeOptions {
        tls: None,
        token: Some("secret".to_string()),
    })
}

#[tokio::test]
async fn native_resubscribes_after_reconnect() {
    let (broker, addr) = start_broker().await;
    resubscribes_after_reconnect(&native(), &addr, "plugin1").await;
    broker.stop().await;
}

#[tokio::test]
async fn native_latest_subscription_wins() {
    let (broker, addr) = start_broker().await;
    latest_subscription_wins(&native(), &addr, "plugin1").await;
    broker.stop().await;
}

#[tokio::test]
async fn native_rejected_credentials_fail_to_connect() {
    let (broker, addr) = start_broker().await;
    let messenger = NativeMessenger::new(NativeOptions {
        tls: None,
        token: Some("wrong".to_string()),
    });
    let err = messenger
        .connect(&addr, "plugin1", TIMEOUT)
        .await
        .expect_err("rejected");
    assert!(matches!(err, MessengerError::Transport(_)));
    assert!(!messenger.is_connected());
    broker.stop().await;
}

#[tokio::test]
async fn connect_to_closed_port_fails() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    drop(listener);
    assert!(native().connect(&addr, "plugin1", TIMEOUT).await.is_err());
    assert!(
        MqttMessenger::new()
            .connect(&addr, "plugin1", TIMEOUT)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn publish_without_connection_is_rejected() {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    let messenger = MqttMessenger::new();
    messenger
        .subscribe("things.delta", recording_handler(&inbox))
        .await
        .expect("buffered");
    assert_eq!(messenger.subscriptions(), vec!["things.delta".to_string()]);
    assert!(matches!(
        messenger.publish("things.delta", b"x").await,
        Err(MessengerError::NoConnection)
    ));
}

/// 握手后立即断开的服务端：订阅重放必然失败。
async fn hang_up_after_handshake() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            if let Ok(socket) = tokio_tungstenite::accept_async(stream).await {
                drop(socket);
            }
        }
    });
    addr
}

#[tokio::test]
async fn failed_replay_leaves_messenger_disconnected() {
    let inbox: Inbox = Arc::new(Mutex::new(Vec::new()));
    let messenger = native();
    let padding = "x".repeat(1024);
    for index in 0..20_000 {
        messenger
            .subscribe(&format!("things.{index}.{padding}"), recording_handler(&inbox))
            .await
            .expect("buffered");
    }
    let addr = hang_up_after_handshake().await;
    messenger
        .connect(&addr, "plugin1", TIMEOUT)
        .await
        .expect_err("replay fails");
    assert!(!messenger.is_connected());
    assert!(matches!(
        messenger.publish("things.0", b"x").await,
        Err(MessengerError::NoConnection)
    ));
    assert_eq!(messenger.subscriptions().len(), 20_000);
}

fn mqtt_addr() -> Option<String> {
    std::env::var("HUB_TEST_MQTT_ADDR").ok()
}

#[tokio::test]
async fn mqtt_resubscribes_after_reconnect() {
    let Some(addr) = mqtt_addr() else {
        return;
    };
    resubscribes_after_reconnect(&MqttMessenger::new(), &addr, "hub-test-resub").await;
}

#[tokio::test]
async fn mqtt_latest_subscription_wins() {
    let Some(addr) = mqtt_addr() else {
        return;
    };
    latest_subscription_wins(&MqttMessenger::new(), &addr, "hub-test-latest").await;
}
