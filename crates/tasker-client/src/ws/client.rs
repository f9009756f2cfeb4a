/*
[INPUT]:  Namespace address and query parameters (task_id when known)
[OUTPUT]: Subscription yielding named task events until closed
[POS]:    WebSocket layer - push-based event channel
[UPDATE]: When changing the handshake, keepalive, reconnection, or close behavior
*/

use crate::config::ReconnectConfig;
use crate::http::{Result, TaskerError};
use crate::types::ChannelEvent;
use crate::ws::packet::{Packet, SocketKind, SocketPacket};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

const EVENT_BUFFER: usize = 100;
const ENGINE_VERSION: &str = "4";

/// Push-based transport delivering named events for one subscription
#[async_trait]
pub trait EventChannel: Send + Sync {
    async fn subscribe(&self, address: &Url, query: &[(String, String)]) -> Result<Subscription>;
}

/// Live event subscription; dropping it closes the underlying connection
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<ChannelEvent>,
    shutdown: CancellationToken,
}

impl Subscription {
    /// Wrap an event receiver. The producer watches `shutdown` to learn about closure.
    pub fn new(events: mpsc::Receiver<ChannelEvent>, shutdown: CancellationToken) -> Self {
        Self { events, shutdown }
    }

    /// Next event, or `None` once the stream ended
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Stop delivery and release the connection
    pub fn close(&mut self) {
        self.shutdown.cancel();
        self.events.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, WsMessage>;
type WsRead = SplitStream<WsStream>;

/// Event channel speaking socket.io over a WebSocket
#[derive(Debug, Clone)]
pub struct SocketEventChannel {
    socket_path: String,
    reconnect: ReconnectConfig,
}

impl SocketEventChannel {
    /// Create a channel for servers mounted at `socket_path` (usually `/socket.io`)
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// WebSocket URL and namespace for a namespace address
    pub fn socket_url(&self, address: &Url, query: &[(String, String)]) -> Result<(Url, String)> {
        let namespace = match address.path().trim_end_matches('/') {
            "" => "/".to_string(),
            path => path.to_string(),
        };

        let scheme = match address.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(TaskerError::Config(format!(
                    "unsupported event channel scheme: {other}"
                )));
            }
        };

        let mut url = address.clone();
        url.set_scheme(scheme)
            .map_err(|_| TaskerError::Config(format!("cannot use {scheme} for {address}")))?;
        url.set_path(&format!("{}/", self.socket_path.trim_end_matches('/')));
        url.set_fragment(None);
        url.set_query(None);
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("EIO", ENGINE_VERSION);
            pairs.append_pair("transport", "websocket");
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok((url, namespace))
    }
}

impl Default for SocketEventChannel {
    fn default() -> Self {
        Self::new("/socket.io")
    }
}

#[async_trait]
impl EventChannel for SocketEventChannel {
    async fn subscribe(&self, address: &Url, query: &[(String, String)]) -> Result<Subscription> {
        let (url, namespace) = self.socket_url(address, query)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let (write, read) = connect(&url, &namespace, &event_tx).await?;
        info!(url = %url, namespace = %namespace, "event subscription open");

        let shutdown = CancellationToken::new();
        let link = SocketLink {
            url,
            namespace,
            reconnect: self.reconnect.clone(),
            events: event_tx,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(link.run(write, read));

        Ok(Subscription::new(event_rx, shutdown))
    }
}

/// How one connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionEnd {
    /// Closed locally, or nobody listens anymore
    Shutdown,
    /// Server closed the engine session or the namespace
    Closed,
    /// Transport dropped without a close from the server
    Lost,
}

/// Background side of one subscription, reconnecting after transport loss
struct SocketLink {
    url: Url,
    namespace: String,
    reconnect: ReconnectConfig,
    events: mpsc::Sender<ChannelEvent>,
    shutdown: CancellationToken,
}

impl SocketLink {
    async fn run(self, mut write: WsWrite, mut read: WsRead) {
        loop {
            let end = self.pump(&mut write, &mut read).await;
            debug!(namespace = %self.namespace, end = ?end, "event connection ended");
            if end != ConnectionEnd::Lost {
                break;
            }

            match self.reconnect().await {
                Some((next_write, next_read)) => {
                    write = next_write;
                    read = next_read;
                }
                None => break,
            }
        }
        debug!(namespace = %self.namespace, "event subscription closed");
    }

    async fn pump(&self, write: &mut WsWrite, read: &mut WsRead) -> ConnectionEnd {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write
                        .send(text_frame(&Packet::Message(SocketPacket::disconnect(&self.namespace))))
                        .await;
                    let _ = write.send(WsMessage::Close(None)).await;
                    return ConnectionEnd::Shutdown;
                }
                incoming = read.next() => match incoming {
                    Some(Ok(WsMessage::Text(frame))) => {
                        match frame_action(frame.as_str(), &self.namespace) {
                            FrameAction::Deliver(event) => {
                                if self.events.send(event).await.is_err() {
                                    return ConnectionEnd::Shutdown;
                                }
                            }
                            FrameAction::Reply(packet) => {
                                if write.send(text_frame(&packet)).await.is_err() {
                                    return ConnectionEnd::Lost;
                                }
                            }
                            FrameAction::Ignore => {}
                            FrameAction::End => return ConnectionEnd::Closed,
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return ConnectionEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, namespace = %self.namespace, "event connection failed");
                        return ConnectionEnd::Lost;
                    }
                    None => return ConnectionEnd::Lost,
                },
            }
        }
    }

    /// Reopen the connection with the original URL and query, rejoining the namespace
    async fn reconnect(&self) -> Option<(WsWrite, WsRead)> {
        for attempt in 0..self.reconnect.max_attempts {
            let delay = self.reconnect.backoff(attempt);
            tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => return None,
                connected = connect(&self.url, &self.namespace, &self.events) => connected,
            };
            match connected {
                Ok(link) => {
                    info!(namespace = %self.namespace, attempt = attempt + 1, "event subscription reconnected");
                    return Some(link);
                }
                Err(TaskerError::ConnectRejected(message)) => {
                    warn!(namespace = %self.namespace, message = %message, "namespace refused on reconnect");
                    return None;
                }
                Err(err) => {
                    warn!(
                        namespace = %self.namespace,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "event reconnect failed"
                    );
                }
            }
        }

        warn!(
            namespace = %self.namespace,
            attempts = self.reconnect.max_attempts,
            "event reconnection exhausted"
        );
        None
    }
}

async fn connect(
    url: &Url,
    namespace: &str,
    events: &mpsc::Sender<ChannelEvent>,
) -> Result<(WsWrite, WsRead)> {
    let (ws_stream, _response) = connect_async(url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();
    handshake(&mut write, &mut read, namespace, events).await?;
    Ok((write, read))
}

#[derive(Debug)]
enum FrameAction {
    Deliver(ChannelEvent),
    Reply(Packet),
    Ignore,
    End,
}

fn frame_action(frame: &str, namespace: &str) -> FrameAction {
    let packet = match Packet::parse(frame) {
        Ok(packet) => packet,
        Err(err) => {
            warn!(error = %err, bytes = frame.len(), "event frame parse failed");
            return FrameAction::Ignore;
        }
    };

    match packet {
        Packet::Ping(data) => FrameAction::Reply(Packet::Pong(data)),
        Packet::Close => FrameAction::End,
        Packet::Message(socket) if socket.namespace == namespace => match socket.kind {
            SocketKind::Event => match socket.as_event() {
                Some((name, payload)) => FrameAction::Deliver(ChannelEvent::new(name, payload)),
                None => {
                    warn!(namespace, "event packet without a name");
                    FrameAction::Ignore
                }
            },
            SocketKind::Disconnect => FrameAction::End,
            _ => FrameAction::Ignore,
        },
        _ => FrameAction::Ignore,
    }
}

async fn handshake<W, R>(
    write: &mut W,
    read: &mut R,
    namespace: &str,
    events: &mpsc::Sender<ChannelEvent>,
) -> Result<()>
where
    W: Sink<WsMessage, Error = WsError> + Unpin,
    R: Stream<Item = std::result::Result<WsMessage, WsError>> + Unpin,
{
    while let Some(incoming) = read.next().await {
        let frame = match incoming? {
            WsMessage::Text(frame) => frame,
            WsMessage::Close(_) => break,
            _ => continue,
        };

        match Packet::parse(frame.as_str())? {
            Packet::Open(handshake) => {
                debug!(sid = ?handshake.get("sid"), "engine session open");
                write
                    .send(text_frame(&Packet::Message(SocketPacket::connect(namespace))))
                    .await?;
            }
            Packet::Ping(data) => write.send(text_frame(&Packet::Pong(data))).await?,
            Packet::Close => break,
            Packet::Message(socket) if socket.namespace == namespace => match socket.kind {
                SocketKind::Connect => return Ok(()),
                SocketKind::ConnectError => {
                    let message = socket
                        .data
                        .as_ref()
                        .and_then(|data| data.get("message"))
                        .and_then(|message| message.as_str())
                        .map(str::to_string)
                        .or_else(|| socket.data.as_ref().map(|data| data.to_string()))
                        .unwrap_or_else(|| "connect error".to_string());
                    return Err(TaskerError::ConnectRejected(message));
                }
                SocketKind::Event => {
                    if let Some((name, payload)) = socket.as_event() {
                        let _ = events.send(ChannelEvent::new(name, payload)).await;
                    }
                }
                _ => {}
            },
            _ => {}
        }
    }

    Err(TaskerError::WebSocket(format!(
        "connection closed before namespace {namespace} was joined"
    )))
}

fn text_frame(packet: &Packet) -> WsMessage {
    WsMessage::Text(packet.encode().into())
}
