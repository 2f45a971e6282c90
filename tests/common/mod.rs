//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use socket_gateway::{Gateway, NetOption};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Start a plaintext gateway on an ephemeral port. `configure` runs before
/// `connect`, so it may register handlers or set further options.
pub fn start_gateway(configure: impl FnOnce(&Gateway)) -> (Gateway, SocketAddr) {
    let gateway = Gateway::new();
    gateway.set_option(NetOption::Port, "0").unwrap();
    configure(&gateway);
    let bound = gateway.connect().unwrap();
    (gateway, loopback(bound))
}

/// The gateway binds the wildcard address; clients dial loopback.
pub fn loopback(addr: SocketAddr) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], addr.port()))
}

pub async fn ws_connect(addr: SocketAddr) -> WsClient {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/"))
        .await
        .unwrap();
    client
}

/// Next data frame as bytes, skipping control frames. `None` once the server closes.
pub async fn next_payload(client: &mut WsClient) -> Option<Vec<u8>> {
    let next = async {
        while let Some(msg) = client.next().await {
            match msg {
                Ok(Message::Binary(data)) => return Some(data.to_vec()),
                Ok(Message::Text(text)) => return Some(text.as_bytes().to_vec()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(5), next)
        .await
        .expect("timed out waiting for a frame")
}

pub async fn send_text(client: &mut WsClient, text: &str) {
    client.send(Message::text(text.to_string())).await.unwrap();
}

/// Poll `condition` until it holds or five seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub fn http_url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}

/// Self-signed PEM chain and key for `localhost`, written to temp files.
pub fn self_signed_pair() -> (tempfile::NamedTempFile, tempfile::NamedTempFile) {
    use std::io::Write;

    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let mut chain = tempfile::NamedTempFile::new().unwrap();
    chain.write_all(cert.cert.pem().as_bytes()).unwrap();
    let mut key = tempfile::NamedTempFile::new().unwrap();
    key.write_all(cert.key_pair.serialize_pem().as_bytes()).unwrap();
    (chain, key)
}
