use std::time::Instant;

use opentelemetry::{Key, KeyValue, Value, metrics::Histogram};

/// Records the time between its creation and [`record`](Recorder::record) to a histogram.
///
/// ```rust
/// use telemetry::metrics::{self, Recorder};
///
/// let mut recorder = Recorder::new(metrics::HTTP_SERVER_REQUEST_DURATION);
/// recorder.push_attribute("http.request.method", "GET");
/// recorder.push_attribute("http.response.status_code", 200_i64);
/// recorder.record();
/// ```
pub struct Recorder {
    start: Instant,
    histogram: Histogram<f64>,
    attributes: Vec<KeyValue>,
}

impl Recorder {
    /// Starts timing for the histogram named `name`, in milliseconds.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            histogram: super::meter().f64_histogram(name).with_unit("ms").build(),
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute to be recorded with the metric.
    pub fn push_attribute<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Key>,
        V: Into<Value>,
    {
        self.attributes.push(KeyValue::new(key, value));
    }

    /// Records the elapsed time to the histogram.
    pub fn record(self) {
        let duration = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.record(duration, &self.attributes);
    }
}
