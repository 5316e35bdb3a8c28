/// Integration tests for the live channel over a real WebSocket connection
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telescope::config::TelescopeConfig;
use telescope::entry::EntryType;
use telescope::storage::MemoryStorage;
use telescope::Telescope;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve_telescope() -> (Telescope, SocketAddr) {
    let config = TelescopeConfig {
        watched_entry_types: EntryType::ALL.to_vec(),
        ..Default::default()
    };
    let telescope = Telescope::new(config, Arc::new(MemoryStorage::new())).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = telescope.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (telescope, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}/telescope/ws", addr))
        .await
        .unwrap();
    client
}

async fn next_json(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        match frame {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {:?}", other),
        }
    }
}

async fn wait_for_sessions(telescope: &Telescope, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while telescope.sessions().session_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session count never settled");
}

#[tokio::test]
async fn test_text_frame_gets_initial_entries() {
    let (telescope, addr) = serve_telescope().await;
    telescope
        .collector()
        .record_custom(None, "seed", json!({ "n": 1 }));
    telescope.collector().flush().await;

    let mut client = connect(addr).await;
    let request = json!({
        "name": "GET_INITIAL_ENTRIES",
        "payload": { "type": "custom", "page": 1, "perPage": 20 }
    });
    client.send(Message::Text(request.to_string())).await.unwrap();

    let reply = next_json(&mut client).await;
    assert_eq!(reply["name"], "INITIAL_ENTRIES");
    assert_eq!(reply["payload"]["pagination"]["total"], 1);
    assert_eq!(reply["payload"]["entries"][0]["custom"]["name"], "seed");
}

#[tokio::test]
async fn test_watching_socket_receives_new_entries() {
    let (telescope, addr) = serve_telescope().await;
    let mut client = connect(addr).await;
    let request = json!({ "name": "GET_INITIAL_ENTRIES", "payload": { "type": "all" } });
    client.send(Message::Text(request.to_string())).await.unwrap();
    assert_eq!(next_json(&mut client).await["name"], "INITIAL_ENTRIES");

    telescope
        .collector()
        .record_custom(None, "cache.miss", json!({ "key": "user:1" }));
    telescope.collector().flush().await;

    let pushed = next_json(&mut client).await;
    assert_eq!(pushed["name"], "NEW_ENTRY");
    assert_eq!(pushed["payload"]["custom"]["name"], "cache.miss");
}

#[tokio::test]
async fn test_malformed_frame_gets_error_reply() {
    let (_telescope, addr) = serve_telescope().await;
    let mut client = connect(addr).await;

    client.send(Message::Text("{not json".to_string())).await.unwrap();
    let reply = next_json(&mut client).await;
    assert_eq!(reply["name"], "error");
    assert!(reply["payload"]["message"]
        .as_str()
        .unwrap()
        .starts_with("Malformed message"));

    // The session survives and still answers well-formed requests
    let request = json!({ "name": "GET_INITIAL_ENTRIES", "payload": { "type": "all" } });
    client.send(Message::Text(request.to_string())).await.unwrap();
    assert_eq!(next_json(&mut client).await["name"], "INITIAL_ENTRIES");
}

#[tokio::test]
async fn test_closing_socket_disconnects_session() {
    let (telescope, addr) = serve_telescope().await;
    let mut client = connect(addr).await;
    let request = json!({ "name": "GET_INITIAL_ENTRIES", "payload": { "type": "all" } });
    client.send(Message::Text(request.to_string())).await.unwrap();
    next_json(&mut client).await;
    assert_eq!(telescope.sessions().session_count(), 1);

    client.close(None).await.unwrap();
    wait_for_sessions(&telescope, 0).await;
}

#[tokio::test]
async fn test_dropped_connection_disconnects_session() {
    let (telescope, addr) = serve_telescope().await;
    let client = connect(addr).await;
    wait_for_sessions(&telescope, 1).await;

    drop(client);
    wait_for_sessions(&telescope, 0).await;
}
