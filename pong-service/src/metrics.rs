use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

pub const ADMITTED: &str = "admitted";
pub const REJECTED: &str = "rejected";

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct OutcomeLabels {
    outcome: String,
}

/// In-process counters for `/ping`. Nothing here outlives the process.
#[derive(Debug)]
pub struct PongMetrics {
    registry: Registry,
    requests_total: Family<OutcomeLabels, Counter>,
    in_flight: Gauge,
}

impl Default for PongMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PongMetrics {
    pub fn new() -> Self {
        let requests_total = Family::<OutcomeLabels, Counter>::default();
        let in_flight = Gauge::default();

        let mut registry = Registry::default();
        registry.register(
            // prometheus-client appends "_total" to counters.
            "pong_requests",
            "Requests to /ping by gate outcome",
            requests_total.clone(),
        );
        registry.register(
            "pong_in_flight",
            "Requests currently holding the permit",
            in_flight.clone(),
        );

        Self {
            registry,
            requests_total,
            in_flight,
        }
    }

    pub fn admitted(&self) {
        self.outcome(ADMITTED).inc();
    }

    pub fn rejected(&self) {
        self.outcome(REJECTED).inc();
    }

    pub fn requests(&self, outcome: &str) -> u64 {
        self.outcome(outcome).get()
    }

    pub fn in_flight(&self) -> i64 {
        self.in_flight.get()
    }

    /// Counts the caller as in flight until the guard is dropped.
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.in_flight.inc();
        InFlightGuard {
            gauge: self.in_flight.clone(),
        }
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        encode(&mut buf, &self.registry)?;
        Ok(buf)
    }

    fn outcome(&self, outcome: &str) -> Counter {
        self.requests_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .clone()
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_render_as_labelled_counters() {
        let metrics = PongMetrics::new();
        metrics.admitted();
        metrics.rejected();
        metrics.rejected();

        let text = metrics.render().unwrap();

        assert!(text.contains("pong_requests_total{outcome=\"admitted\"} 1"));
        assert!(text.contains("pong_requests_total{outcome=\"rejected\"} 2"));
        assert_eq!(metrics.requests(REJECTED), 2);
    }

    #[test]
    fn in_flight_guard_decrements_on_drop() {
        let metrics = PongMetrics::new();
        let guard = metrics.track_in_flight();
        assert_eq!(metrics.in_flight(), 1);
        drop(guard);
        assert_eq!(metrics.in_flight(), 0);
    }
}
