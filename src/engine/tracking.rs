//! Order tracking: load the latest order (live first, local fallback second),
//! keep it fresh by polling, and apply pushed status and courier updates.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::client::ApiClient;
use crate::api::push::{
    PushChannel, PushSubscription, courier_location_url, order_status_url,
};
use crate::config::Config;
use crate::fallback::FallbackCache;
use crate::models::address::Coordinates;
use crate::models::order::{OrderId, OrderSnapshot};
use crate::models::tracking::{OrderSource, PushMessage, TrackingEvent, TrackingView};

const EVENT_BUFFER: usize = 64;
const PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct TrackingSettings {
    pub ws_base_url: String,
    pub live_poll: Duration,
    pub fallback_poll: Duration,
}

impl From<&Config> for TrackingSettings {
    fn from(config: &Config) -> Self {
        Self {
            ws_base_url: config.ws_base_url.clone(),
            live_poll: config.live_poll_interval(),
            fallback_poll: config.fallback_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Live(OrderSnapshot),
    Fallback { order: OrderSnapshot, reason: String },
    Unavailable(String),
}

/// Reads the latest order from the API, falling back to the locally cached
/// copy when the API fails or has no orders.
pub async fn load_latest(api: &ApiClient, fallback: &FallbackCache) -> LoadOutcome {
    let reason = match api.latest_order().await {
        Ok(Some(order)) => {
            count_read(api, "live");
            return LoadOutcome::Live(order);
        }
        Ok(None) => "no orders found".to_string(),
        Err(err) => err.to_string(),
    };

    match fallback.get().await {
        Ok(Some(order)) => {
            warn!(order_id = order.id, reason = %reason, "showing fallback order");
            count_read(api, "fallback");
            LoadOutcome::Fallback { order, reason }
        }
        Ok(None) => {
            count_read(api, "none");
            LoadOutcome::Unavailable(reason)
        }
        Err(err) => {
            warn!(error = %err, "fallback order unreadable");
            count_read(api, "none");
            LoadOutcome::Unavailable(reason)
        }
    }
}

fn count_read(api: &ApiClient, source: &str) {
    api.metrics()
        .tracking_reads_total
        .with_label_values(&[source])
        .inc();
}

pub fn apply_load(view: &mut TrackingView, outcome: LoadOutcome) -> TrackingEvent {
    match outcome {
        LoadOutcome::Live(order) => {
            replace_order(view, order.clone());
            view.degraded = false;
            view.error = None;
            TrackingEvent::OrderLoaded {
                order,
                source: OrderSource::Live,
            }
        }
        LoadOutcome::Fallback { order, .. } => {
            replace_order(view, order.clone());
            view.degraded = true;
            view.error = None;
            TrackingEvent::OrderLoaded {
                order,
                source: OrderSource::Fallback,
            }
        }
        LoadOutcome::Unavailable(reason) => {
            view.error = Some(reason.clone());
            TrackingEvent::Unavailable(reason)
        }
    }
}

fn replace_order(view: &mut TrackingView, order: OrderSnapshot) {
    let same_order = view.order.as_ref().map(|current| current.id) == Some(order.id);
    if !same_order {
        view.courier_location = None;
        view.location_history.clear();
    }
    view.order = Some(order);
}

/// Applies a pushed message. Status updates for any order other than the one
/// on display are ignored.
pub fn apply_push(view: &mut TrackingView, message: PushMessage) -> Option<TrackingEvent> {
    match message {
        PushMessage::StatusUpdate {
            order_id,
            status,
            timestamp,
        } => {
            let order = view.order.as_mut().filter(|order| order.id == order_id)?;
            order.status = status.clone();
            if timestamp.is_some() {
                order.status_timestamp = timestamp.clone();
            }
            Some(TrackingEvent::StatusChanged {
                order_id,
                status,
                timestamp,
            })
        }
        PushMessage::LocationUpdate { payload } => {
            let position = Coordinates {
                latitude: payload.latitude,
                longitude: payload.longitude,
            };
            view.record_location(position);
            Some(TrackingEvent::CourierMoved(position))
        }
    }
}

/// Polling period for the current view; `None` when there is nothing to refresh.
pub fn poll_interval(view: &TrackingView, settings: &TrackingSettings) -> Option<Duration> {
    if view.degraded {
        Some(settings.fallback_poll)
    } else if view.order.is_some() {
        Some(settings.live_poll)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct Tracker {
    api: Arc<ApiClient>,
    fallback: FallbackCache,
    settings: TrackingSettings,
}

impl Tracker {
    pub fn new(api: Arc<ApiClient>, fallback: FallbackCache, settings: TrackingSettings) -> Self {
        Self {
            api,
            fallback,
            settings,
        }
    }

    /// Starts tracking in the background. Dropping or stopping the handle
    /// closes push channels and halts polling.
    pub fn start(&self) -> TrackingSession {
        let (view_tx, view_rx) = watch::channel(TrackingView::default());
        let (events, _unused_rx) = broadcast::channel(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());

        let task = tokio::spawn(drive(
            self.clone(),
            view_tx,
            events.clone(),
            refresh.clone(),
            cancel.clone(),
        ));

        TrackingSession {
            view_rx,
            events,
            refresh,
            cancel,
            task: Some(task),
        }
    }

    async fn open_channels(
        &self,
        order_id: OrderId,
        push_tx: &mpsc::Sender<(PushChannel, PushMessage)>,
    ) -> Vec<PushSubscription> {
        let metrics = self.api.metrics().clone();
        let mut subscriptions = vec![PushSubscription::open(
            PushChannel::OrderStatus,
            order_status_url(&self.settings.ws_base_url, order_id),
            push_tx.clone(),
            metrics.clone(),
        )];

        match self.api.tokens().access_token().await {
            Ok(Some(token)) => subscriptions.push(PushSubscription::open(
                PushChannel::CourierLocation,
                courier_location_url(&self.settings.ws_base_url, &token),
                push_tx.clone(),
                metrics,
            )),
            Ok(None) => debug!("no access token; courier location channel not opened"),
            Err(err) => warn!(error = %err, "could not read access token"),
        }

        subscriptions
    }
}

pub struct TrackingSession {
    view_rx: watch::Receiver<TrackingView>,
    events: broadcast::Sender<TrackingEvent>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TrackingSession {
    pub fn view(&self) -> TrackingView {
        self.view_rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<TrackingView> {
        self.view_rx.clone()
    }

    pub fn updates(&self) -> BroadcastStream<TrackingEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Reloads immediately, e.g. when the tracking view regains focus.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn drive(
    tracker: Tracker,
    view_tx: watch::Sender<TrackingView>,
    events: broadcast::Sender<TrackingEvent>,
    refresh: Arc<Notify>,
    cancel: CancellationToken,
) {
    info!("order tracking started");

    let (push_tx, mut push_rx) = mpsc::channel(PUSH_BUFFER);
    let mut view = TrackingView::default();
    let mut subscriptions: Vec<PushSubscription> = Vec::new();
    let mut subscribed_to: Option<OrderId> = None;
    let mut poll_key: Option<(bool, Option<OrderId>)> = None;
    let mut next_poll: Option<Instant> = None;

    let mut reload = true;
    loop {
        if reload {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = load_latest(&tracker.api, &tracker.fallback) => outcome,
            };
            let _ = events.send(apply_load(&mut view, outcome));
            next_poll = poll_interval(&view, &tracker.settings).map(|every| Instant::now() + every);
            reload = false;
        }

        let current_id = view.order.as_ref().map(|order| order.id);
        if current_id != subscribed_to {
            for subscription in subscriptions.drain(..) {
                subscription.close().await;
            }
            if let Some(order_id) = current_id {
                subscriptions = tracker.open_channels(order_id, &push_tx).await;
            }
            subscribed_to = current_id;
        }

        let key = (view.degraded, current_id);
        if poll_key != Some(key) {
            poll_key = Some(key);
            next_poll = poll_interval(&view, &tracker.settings).map(|every| Instant::now() + every);
        }

        view_tx.send_replace(view.clone());

        let poll_due = async {
            match next_poll {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = refresh.notified() => reload = true,
            _ = poll_due => reload = true,
            Some((channel, message)) = push_rx.recv() => {
                debug!(channel = channel.label(), "push message received");
                if let Some(event) = apply_push(&mut view, message) {
                    let _ = events.send(event);
                }
            }
        }
    }

    for subscription in subscriptions {
        subscription.close().await;
    }
    info!("order tracking stopped");
}
