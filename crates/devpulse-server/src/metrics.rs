use devpulse_core::{ContextStatus, FetchStatus, Platform};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

// ── Label types ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PlatformLabel {
    pub platform: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FetchLabel {
    pub platform: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ChatLabel {
    pub intent: String,
    pub scope: String,
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub status: String,
}

impl PlatformLabel {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform: platform.as_str().to_string(),
        }
    }
}

// ── Metrics registry ───────────────────────────────────────────────────────────

pub struct DevPulseMetrics {
    pub registry: Registry,

    // Fetches
    pub fetches: Family<FetchLabel, Counter>,
    pub fetch_duration: Family<PlatformLabel, Histogram>,

    // Context store, 1 when the section is `fetched`; set at scrape time
    pub context_fetched: Family<PlatformLabel, Gauge>,

    // Chat
    pub chat_requests: Family<ChatLabel, Counter>,

    // HTTP request counter (method × status)
    pub http_requests: Family<HttpLabel, Counter>,

    pub refresh_cycles: Counter,

    // Uptime (set on each scrape)
    pub uptime_seconds: Gauge,
}

impl DevPulseMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let fetches: Family<FetchLabel, Counter> = Family::default();
        registry.register(
            "devpulse_fetches_total",
            "Platform fetches by platform and outcome",
            fetches.clone(),
        );

        let fetch_duration: Family<PlatformLabel, Histogram> = Family::new_with_constructor(|| {
            Histogram::new([0.1_f64, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0].into_iter())
        });
        registry.register(
            "devpulse_fetch_duration_seconds",
            "Platform fetch latency in seconds",
            fetch_duration.clone(),
        );

        let context_fetched: Family<PlatformLabel, Gauge> = Family::default();
        registry.register(
            "devpulse_context_fetched",
            "Whether the platform section holds freshly fetched data",
            context_fetched.clone(),
        );

        let chat_requests: Family<ChatLabel, Counter> = Family::default();
        registry.register(
            "devpulse_chat_requests_total",
            "Chatbot requests by intent, scope and outcome",
            chat_requests.clone(),
        );

        let http_requests: Family<HttpLabel, Counter> = Family::default();
        registry.register(
            "devpulse_http_requests_total",
            "HTTP requests by method and status",
            http_requests.clone(),
        );

        let refresh_cycles: Counter = Counter::default();
        registry.register(
            "devpulse_refresh_cycles_total",
            "Background refresh cycles completed",
            refresh_cycles.clone(),
        );

        let uptime_seconds: Gauge = Gauge::default();
        registry.register(
            "devpulse_uptime_seconds",
            "Server uptime in seconds",
            uptime_seconds.clone(),
        );

        Self {
            registry,
            fetches,
            fetch_duration,
            context_fetched,
            chat_requests,
            http_requests,
            refresh_cycles,
            uptime_seconds,
        }
    }

    pub fn record_fetch(&self, platform: Platform, outcome: &str, seconds: f64) {
        self.fetches
            .get_or_create(&FetchLabel {
                platform: platform.as_str().to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
        self.fetch_duration
            .get_or_create(&PlatformLabel::new(platform))
            .observe(seconds);
    }

    pub fn record_chat(&self, intent: &str, scope: &str, outcome: &str) {
        self.chat_requests
            .get_or_create(&ChatLabel {
                intent: intent.to_string(),
                scope: scope.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Refresh scrape-time gauges from the current context status.
    pub fn observe_context(&self, status: &ContextStatus, uptime_secs: u64) {
        for (platform, source) in &status.data_sources {
            let value = i64::from(source.status == FetchStatus::Fetched);
            self.context_fetched
                .get_or_create(&PlatformLabel::new(*platform))
                .set(value);
        }
        self.uptime_seconds.set(uptime_secs as i64);
    }

    /// Prometheus text exposition of the registry.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        prometheus_client::encoding::text::encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for DevPulseMetrics {
    fn default() -> Self {
        Self::new()
    }
}
