//! WebSocket behaviour of the gateway facade.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use socket_gateway::{ConnectionId, GatewayError};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

mod common;

#[tokio::test]
async fn test_echo_through_send() {
    let (gateway, addr) = common::start_gateway(|gateway| {
        let echo = gateway.clone();
        gateway
            .register_message_handler(move |id, payload| {
                echo.send(id, payload).unwrap();
            })
            .unwrap();
    });

    let mut client = common::ws_connect(addr).await;
    common::send_text(&mut client, "hello").await;
    assert_eq!(common::next_payload(&mut client).await.unwrap(), b"hello");

    client.send(Message::binary(vec![0u8, 159, 146, 150])).await.unwrap();
    assert_eq!(common::next_payload(&mut client).await.unwrap(), vec![0u8, 159, 146, 150]);

    gateway.shutdown();
}

#[tokio::test]
async fn test_frames_arrive_in_order() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (gateway, addr) = common::start_gateway(|gateway| {
        gateway
            .register_message_handler(move |_, payload| {
                let _ = tx.send(payload);
            })
            .unwrap();
    });

    let mut client = common::ws_connect(addr).await;
    for i in 0..20 {
        common::send_text(&mut client, &i.to_string()).await;
    }
    for i in 0..20 {
        let payload = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(payload.as_ref(), i.to_string().as_bytes());
    }

    gateway.shutdown();
}

#[tokio::test]
async fn test_host_pushes_to_connection() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (gateway, addr) = common::start_gateway(|gateway| {
        gateway
            .register_message_handler(move |id, _| {
                let _ = tx.send(id);
            })
            .unwrap();
    });

    let mut client = common::ws_connect(addr).await;
    common::send_text(&mut client, "hello").await;
    let id = rx.recv().await.unwrap();

    // From a thread the reactor does not own.
    let pusher = gateway.clone();
    std::thread::spawn(move || pusher.send(id, "pushed"))
        .join()
        .unwrap()
        .unwrap();
    assert_eq!(common::next_payload(&mut client).await.unwrap(), b"pushed");

    gateway.shutdown();
}

#[tokio::test]
async fn test_connections_get_distinct_ids() {
    let seen: Arc<Mutex<Vec<ConnectionId>>> = Arc::default();
    let recorder = seen.clone();
    let (gateway, addr) = common::start_gateway(|gateway| {
        gateway
            .register_message_handler(move |id, _| recorder.lock().unwrap().push(id))
            .unwrap();
    });

    let mut clients = Vec::new();
    for _ in 0..5 {
        let mut client = common::ws_connect(addr).await;
        common::send_text(&mut client, "hi").await;
        clients.push(client);
    }

    assert!(common::eventually(|| seen.lock().unwrap().len() == 5).await);
    let mut ids = seen.lock().unwrap().clone();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 5);
    assert_eq!(gateway.connection_count(), 5);

    gateway.shutdown();
}

#[tokio::test]
async fn test_send_after_close_fails() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (gateway, addr) = common::start_gateway(|gateway| {
        gateway
            .register_message_handler(move |id, _| {
                let _ = tx.send(id);
            })
            .unwrap();
    });

    let mut client = common::ws_connect(addr).await;
    common::send_text(&mut client, "hello").await;
    let id = rx.recv().await.unwrap();
    assert!(gateway.is_connected(id));

    client.close(None).await.unwrap();
    drop(client);

    assert!(common::eventually(|| gateway.connection_count() == 0).await);
    assert!(!gateway.is_connected(id));
    assert!(matches!(
        gateway.send(id, "late"),
        Err(GatewayError::SendFailed { id: failed, .. }) if failed == id
    ));

    gateway.shutdown();
}

#[tokio::test]
async fn test_peer_close_is_answered() {
    let (gateway, addr) = common::start_gateway(|_| {});
    let mut client = common::ws_connect(addr).await;
    assert!(common::eventually(|| gateway.connection_count() == 1).await);

    client.close(None).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), client.next()).await.unwrap();
    assert!(matches!(reply, Some(Ok(Message::Close(_)))), "unexpected reply: {reply:?}");

    assert!(common::eventually(|| gateway.connection_count() == 0).await);
    gateway.shutdown();
}

#[tokio::test]
async fn test_frames_without_handler_are_dropped() {
    let (gateway, addr) = common::start_gateway(|_| {});

    let mut client = common::ws_connect(addr).await;
    common::send_text(&mut client, "nobody listens").await;
    assert!(common::eventually(|| gateway.connection_count() == 1).await);

    gateway.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let (gateway, addr) = common::start_gateway(|_| {});
    let mut client = common::ws_connect(addr).await;
    assert!(common::eventually(|| gateway.connection_count() == 1).await);

    let stopper = gateway.clone();
    tokio::task::spawn_blocking(move || stopper.shutdown()).await.unwrap();

    assert_eq!(common::next_payload(&mut client).await, None);
    assert_eq!(gateway.connection_count(), 0);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
