use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use order_stream::application::ports::EventBus;
use order_stream::shared::protocol::{MARKET_TICKS_TOPIC, ORDER_UPDATES_TOPIC};
use order_stream::{FanOutHub, Order, OrderRequest, OrderStatus, ServiceConfig, ServiceRuntime};
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server() -> (ServiceRuntime, SocketAddr) {
    let runtime = ServiceRuntime::start(ServiceConfig {
        port: 0,
        fill_latency: Duration::from_millis(50),
        ..ServiceConfig::default()
    })
    .await
    .expect("runtime starts");

    let listener = runtime.bind().await.expect("binds an ephemeral port");
    let addr = listener.local_addr().unwrap();
    let app = runtime.router();
    tokio::spawn(async move { axum::serve(listener, app).await });

    (runtime, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/stream"))
        .await
        .expect("websocket handshake");
    client
}

async fn wait_for_connections(hub: &Arc<FanOutHub>, expected: usize) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while hub.connection_count() != expected {
        assert!(
            tokio::time::Instant::now() < deadline,
            "expected {expected} connections, have {}",
            hub.connection_count()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("frame ok");
        match frame {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_two_clients_receive_identical_payloads_in_bus_order() {
    let (runtime, addr) = start_server().await;
    let hub = runtime.hub();
    let bus = runtime.bus();

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_connections(&hub, 2).await;

    let payloads = [
        (MARKET_TICKS_TOPIC, r#"{"symbol":"TCS","price":2504.1,"volume":42,"timestamp":1700000000000}"#),
        (ORDER_UPDATES_TOPIC, r#"{"id":"x","status":"PENDING"}"#),
        (MARKET_TICKS_TOPIC, r#"{"symbol":"INFY","price":2501.9,"volume":7,"timestamp":1700000000100}"#),
    ];
    for (topic, payload) in payloads {
        bus.publish(topic, Bytes::from_static(payload.as_bytes())).await.unwrap();
    }

    for (_, payload) in payloads {
        assert_eq!(next_text(&mut a).await, payload);
        assert_eq!(next_text(&mut b).await, payload);
    }

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_mid_stream_keeps_other_clients_served() {
    let (runtime, addr) = start_server().await;
    let hub = runtime.hub();
    let bus = runtime.bus();

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    wait_for_connections(&hub, 2).await;

    bus.publish(MARKET_TICKS_TOPIC, Bytes::from_static(b"first")).await.unwrap();
    assert_eq!(next_text(&mut a).await, "first");
    assert_eq!(next_text(&mut b).await, "first");

    // 客户端 A 主动断开
    a.close(None).await.unwrap();
    drop(a);
    wait_for_connections(&hub, 1).await;

    bus.publish(MARKET_TICKS_TOPIC, Bytes::from_static(b"second")).await.unwrap();
    assert_eq!(next_text(&mut b).await, "second");

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_client_frames_are_ignored() {
    let (runtime, addr) = start_server().await;
    let hub = runtime.hub();

    let mut client = connect(addr).await;
    wait_for_connections(&hub, 1).await;

    client.send(Message::Text("subscribe please".to_string())).await.unwrap();
    runtime
        .bus()
        .publish(ORDER_UPDATES_TOPIC, Bytes::from_static(b"update"))
        .await
        .unwrap();

    assert_eq!(next_text(&mut client).await, "update");
    assert_eq!(hub.connection_count(), 1);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_order_lifecycle_is_streamed() {
    let (runtime, addr) = start_server().await;
    let hub = runtime.hub();

    let mut client = connect(addr).await;
    wait_for_connections(&hub, 1).await;

    let order = runtime
        .manager()
        .submit_order(OrderRequest {
            symbol: "TCS".to_string(),
            side: "BUY".to_string(),
            order_type: "MARKET".to_string(),
            quantity: 10,
            price: Decimal::ZERO,
        })
        .await
        .unwrap();

    let pending: Order = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(pending.id, order.id);
    assert_eq!(pending.status, OrderStatus::Pending);

    let filled: Order = serde_json::from_str(&next_text(&mut client).await).unwrap();
    assert_eq!(filled.id, order.id);
    assert_eq!(filled.status, OrderStatus::Filled);

    runtime.shutdown().await;
}
