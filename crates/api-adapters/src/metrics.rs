//! Prometheus counters for the HTTP surface.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub route: String,
}

pub struct ApiMetrics {
    registry: Registry,
    webhook_updates: Counter,
    rejected_webhooks: Counter,
    admin_requests: Family<RouteLabels, Counter>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("civic_bot");

        let webhook_updates = Counter::default();
        registry.register(
            "webhook_updates",
            "Inbound updates accepted on the webhook",
            webhook_updates.clone(),
        );
        let rejected_webhooks = Counter::default();
        registry.register(
            "webhook_rejected",
            "Webhook deliveries refused for a bad secret or body",
            rejected_webhooks.clone(),
        );
        let admin_requests = Family::<RouteLabels, Counter>::default();
        registry.register(
            "admin_api_requests",
            "Authenticated admin API calls by route",
            admin_requests.clone(),
        );

        Self {
            registry,
            webhook_updates,
            rejected_webhooks,
            admin_requests,
        }
    }

    pub fn webhook_update(&self) {
        self.webhook_updates.inc();
    }

    pub fn webhook_rejected(&self) {
        self.rejected_webhooks.inc();
    }

    pub fn admin_request(&self, route: &str) {
        self.admin_requests
            .get_or_create(&RouteLabels {
                route: route.to_string(),
            })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}
