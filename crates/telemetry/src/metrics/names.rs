//! Metric names. HTTP metrics follow the OpenTelemetry semantic conventions.
//! See: https://opentelemetry.io/docs/specs/semconv/http/http-metrics/

/// HTTP server request duration in milliseconds
/// Note: Histograms automatically provide count and sum, so a separate counter is not needed
pub const HTTP_SERVER_REQUEST_DURATION: &str = "http.server.request.duration";

/// Rate limit decisions, with a `decision` attribute of `admitted` or `rejected`
pub const RATE_LIMIT_DECISIONS: &str = "tollgate.rate_limit.decisions";

/// Client buckets dropped after sitting idle
pub const RATE_LIMIT_EVICTIONS: &str = "tollgate.rate_limit.evictions";
