use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_submissions_total: IntCounterVec,
    pub auth_refresh_total: IntCounterVec,
    pub tracking_reads_total: IntCounterVec,
    pub push_messages_total: IntCounterVec,
    pub open_push_channels: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_submissions_total = IntCounterVec::new(
            Opts::new("order_submissions_total", "Order submissions by outcome"),
            &["outcome"],
        )
        .expect("valid order_submissions_total metric");

        let auth_refresh_total = IntCounterVec::new(
            Opts::new("auth_refresh_total", "Access token refresh attempts by outcome"),
            &["outcome"],
        )
        .expect("valid auth_refresh_total metric");

        let tracking_reads_total = IntCounterVec::new(
            Opts::new("tracking_reads_total", "Tracked order reads by data source"),
            &["source"],
        )
        .expect("valid tracking_reads_total metric");

        let push_messages_total = IntCounterVec::new(
            Opts::new("push_messages_total", "Push messages received by channel"),
            &["channel"],
        )
        .expect("valid push_messages_total metric");

        let open_push_channels =
            IntGauge::new("open_push_channels", "Currently connected push channels")
                .expect("valid open_push_channels metric");

        registry
            .register(Box::new(order_submissions_total.clone()))
            .expect("register order_submissions_total");
        registry
            .register(Box::new(auth_refresh_total.clone()))
            .expect("register auth_refresh_total");
        registry
            .register(Box::new(tracking_reads_total.clone()))
            .expect("register tracking_reads_total");
        registry
            .register(Box::new(push_messages_total.clone()))
            .expect("register push_messages_total");
        registry
            .register(Box::new(open_push_channels.clone()))
            .expect("register open_push_channels");

        Self {
            registry,
            order_submissions_total,
            auth_refresh_total,
            tracking_reads_total,
            push_messages_total,
            open_push_channels,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
