//! Process-wide hub lifecycle. Kept in its own test binary because the hub
//! can only be initialized once per process.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use wsevent::{init, init_with_port, publish_event, HubError, Options};

#[tokio::test]
async fn test_process_hub_lifecycle() {
    // Publishing before initialization is rejected
    let err = publish_event(json!({"event": "early"})).await.unwrap_err();
    assert!(matches!(err, HubError::NotInitialized));
    assert!(wsevent::init::hub().is_none());

    // A failed bind leaves the process hub uninstalled
    let occupied = TcpListener::bind("0.0.0.0:0").await.unwrap();
    let taken_port = occupied.local_addr().unwrap().port();
    let err = init_with_port("/wsevents", taken_port, Options::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::Io(_)));
    assert!(wsevent::init::hub().is_none());

    let addr = init_with_port(
        "/wsevents",
        0,
        Options {
            publish_routine_num: 1,
            ..Options::default()
        },
    )
    .await
    .unwrap();

    // A second initialization is rejected, whichever entry point is used
    assert!(matches!(
        init("/wsevents", Options::default()),
        Err(HubError::AlreadyInitialized)
    ));
    assert!(matches!(
        init_with_port("/wsevents", 0, Options::default()).await,
        Err(HubError::AlreadyInitialized)
    ));

    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{}/wsevents", addr.port()))
        .await
        .unwrap();

    ws.send(Message::Text(r#"{"type":"reg","args":null}"#.to_string().into()))
        .await
        .unwrap();

    let mut received = Vec::new();
    while received.len() < 2 {
        let frame = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for a message");

        match frame {
            Some(Ok(Message::Text(text))) => {
                let envelope: Value = serde_json::from_str(&text).unwrap();
                if envelope["t"] == "reg" {
                    publish_event(json!({"event": "x"})).await.unwrap();
                }
                received.push(envelope);
            }
            Some(Ok(_)) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    assert_eq!(received[0]["d"]["status"], "ok");
    assert_eq!(received[1]["t"], "event");
    assert_eq!(received[1]["d"], json!({"event": "x"}));
}
