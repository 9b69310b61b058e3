use fleetwatch_core::AgentStatus;
use fleetwatch_monitor::{
    LiveTransport, Monitor, MonitorSettings, SignalKind, TransportSignal, WebSocketTransport,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

const WAIT: Duration = Duration::from_secs(5);

/// Accepts one client, pushes `frames`, then either closes or waits for the
/// client to go away.
async fn serve_once(frames: Vec<String>, close_after: bool) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("handshake");
        for frame in frames {
            ws.send(Message::Text(frame)).await.expect("send");
        }
        if close_after {
            let _ = ws.close(None).await;
        }
        while let Some(Ok(_)) = ws.next().await {}
    });
    addr
}

fn monitor_url(addr: SocketAddr) -> Url {
    Url::parse(&format!("ws://{addr}/monitor")).expect("url")
}

async fn next_signal(rx: &mut mpsc::UnboundedReceiver<TransportSignal>) -> TransportSignal {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("signal in time")
        .expect("channel open")
}

#[tokio::test]
async fn reports_open_messages_and_close() {
    let frame = r#"{"type":"log_entry","message":"hello"}"#.to_string();
    let addr = serve_once(vec![frame.clone()], true).await;
    let mut transport = WebSocketTransport::new(monitor_url(addr));
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.open(3, tx);

    assert_eq!(
        next_signal(&mut rx).await,
        TransportSignal {
            attempt: 3,
            kind: SignalKind::Opened
        }
    );
    assert_eq!(next_signal(&mut rx).await.kind, SignalKind::Message(frame));
    assert_eq!(next_signal(&mut rx).await.kind, SignalKind::Closed);
}

#[tokio::test]
async fn refused_connection_reports_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let mut transport = WebSocketTransport::new(monitor_url(addr));
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.open(1, tx);
    let signal = next_signal(&mut rx).await;
    assert_eq!(signal.attempt, 1);
    assert!(matches!(signal.kind, SignalKind::Error(_)));
}

#[tokio::test]
async fn monitor_applies_live_updates_from_server() {
    let frames = vec![
        r#"{"type":"agent_update","agent":"batgirl","status":"active","progress":35,"files":["components/Dashboard.jsx"]}"#
            .to_string(),
        r#"{"type":"stats_update","stats":{"completedTasks":2}}"#.to_string(),
    ];
    let addr = serve_once(frames, false).await;
    let (monitor, handle) = Monitor::new(
        MonitorSettings::default(),
        WebSocketTransport::new(monitor_url(addr)),
    );
    let task = tokio::spawn(monitor.run());

    let snapshot = tokio::time::timeout(WAIT, async {
        loop {
            let snapshot = handle.snapshot().await.expect("snapshot");
            if snapshot.connected && snapshot.stats.completed_tasks == 2 {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("live update applied");

    assert_eq!(snapshot.authority, "live");
    let batgirl = snapshot
        .agents
        .iter()
        .find(|agent| agent.id == "batgirl")
        .expect("batgirl");
    assert_eq!(batgirl.status, AgentStatus::Active);
    assert_eq!(batgirl.progress, 35);
    assert_eq!(snapshot.stats.files_modified, 1);

    handle.shutdown().await;
    task.await.expect("join");
}
