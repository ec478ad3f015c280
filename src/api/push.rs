//! Server-push channels for order status and courier location.
//!
//! Each channel is a [`PushSubscription`] with an explicit lifecycle: it is
//! opened once an order id is known and cancelled by `close()` or on drop.
//! Dropped connections are re-established with capped exponential backoff
//! until the subscription is cancelled.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::models::order::OrderId;
use crate::models::tracking::PushMessage;
use crate::observability::metrics::Metrics;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushChannel {
    OrderStatus,
    CourierLocation,
}

impl PushChannel {
    pub fn label(&self) -> &'static str {
        match self {
            PushChannel::OrderStatus => "order_status",
            PushChannel::CourierLocation => "courier_location",
        }
    }
}

pub fn order_status_url(ws_base: &str, order_id: OrderId) -> String {
    format!("{}/ws/orders/{order_id}/status", ws_base.trim_end_matches('/'))
}

pub fn courier_location_url(ws_base: &str, token: &str) -> String {
    format!("{}/ws/tracking?token={token}", ws_base.trim_end_matches('/'))
}

pub type PushSender = mpsc::Sender<(PushChannel, PushMessage)>;

pub async fn connect(url: &str) -> AppResult<Socket> {
    let (socket, _response) = connect_async(url).await?;
    Ok(socket)
}

pub struct PushSubscription {
    channel: PushChannel,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PushSubscription {
    pub fn open(
        channel: PushChannel,
        url: String,
        tx: PushSender,
        metrics: Arc<Metrics>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_channel(channel, url, tx, metrics, cancel.clone()));

        Self {
            channel,
            cancel,
            task: Some(task),
        }
    }

    pub fn channel(&self) -> PushChannel {
        self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
            || self
                .task
                .as_ref()
                .map(JoinHandle::is_finished)
                .unwrap_or(true)
    }

    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PumpExit {
    Cancelled,
    ReceiverGone,
    Disconnected,
}

async fn run_channel(
    channel: PushChannel,
    url: String,
    tx: PushSender,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect(&url) => result,
        };

        match connected {
            Ok(mut socket) => {
                info!(channel = channel.label(), "push channel connected");
                backoff = INITIAL_BACKOFF;

                metrics.open_push_channels.inc();
                let exit = pump(&mut socket, channel, &tx, &metrics, &cancel).await;
                metrics.open_push_channels.dec();

                match exit {
                    PumpExit::Cancelled | PumpExit::ReceiverGone => {
                        let _ = socket.close(None).await;
                        info!(channel = channel.label(), "push channel closed");
                        return;
                    }
                    PumpExit::Disconnected => {
                        warn!(channel = channel.label(), "push channel dropped; reconnecting");
                    }
                }
            }
            Err(err) => {
                warn!(channel = channel.label(), error = %err, "push channel connect failed");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn pump(
    socket: &mut Socket,
    channel: PushChannel,
    tx: &PushSender,
    metrics: &Metrics,
    cancel: &CancellationToken,
) -> PumpExit {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return PumpExit::Cancelled,
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let Some(message) = PushMessage::parse(&text) else {
                        debug!(channel = channel.label(), "ignoring unrecognized push frame");
                        continue;
                    };

                    metrics
                        .push_messages_total
                        .with_label_values(&[channel.label()])
                        .inc();

                    if tx.send((channel, message)).await.is_err() {
                        return PumpExit::ReceiverGone;
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = socket.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(_))) | None => return PumpExit::Disconnected,
                Some(Err(err)) => {
                    warn!(channel = channel.label(), error = %err, "push channel error");
                    return PumpExit::Disconnected;
                }
                Some(Ok(_)) => {}
            }
        }
    }
}
