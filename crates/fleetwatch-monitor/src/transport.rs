use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

/// Event reported by a live transport. `attempt` identifies the `open`
/// call that produced it so signals from a superseded socket can be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSignal {
    pub attempt: u64,
    pub kind: SignalKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    Opened,
    Message(String),
    Closed,
    Error(String),
}

/// Boundary to the live update source.
///
/// `open` must not block: it starts the connection in the background and
/// reports progress through `signals`. At most one connection is live; a new
/// `open` supersedes the previous one.
pub trait LiveTransport: Send {
    fn open(&mut self, attempt: u64, signals: mpsc::UnboundedSender<TransportSignal>);
    fn close(&mut self);
}

pub struct WebSocketTransport {
    url: Url,
    task: Option<JoinHandle<()>>,
}

impl WebSocketTransport {
    pub fn new(url: Url) -> Self {
        Self { url, task: None }
    }
}

impl LiveTransport for WebSocketTransport {
    fn open(&mut self, attempt: u64, signals: mpsc::UnboundedSender<TransportSignal>) {
        self.close();
        let url = self.url.clone();
        self.task = Some(tokio::spawn(async move {
            read_socket(url, attempt, signals).await;
        }));
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn read_socket(url: Url, attempt: u64, signals: mpsc::UnboundedSender<TransportSignal>) {
    let emit = |kind: SignalKind| signals.send(TransportSignal { attempt, kind }).is_ok();

    let (mut ws, _) = match connect_async(url.as_str()).await {
        Ok(value) => value,
        Err(err) => {
            debug!(url = %url, "live_connect_error: {err}");
            emit(SignalKind::Error(err.to_string()));
            return;
        }
    };
    if !emit(SignalKind::Opened) {
        return;
    }

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if !emit(SignalKind::Message(text)) {
                    return;
                }
            }
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    if !emit(SignalKind::Message(text)) {
                        return;
                    }
                }
                Err(_) => warn!("live_binary_frame_not_utf8"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                emit(SignalKind::Error(err.to_string()));
                return;
            }
        }
    }
    emit(SignalKind::Closed);
}
