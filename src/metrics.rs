//! Per-client issuance counters and optional `metrics` crate integration.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
#[cfg(feature = "metrics")] use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
#[cfg(feature = "metrics")] use smallvec::SmallVec;
// self
use crate::_prelude::*;

#[cfg(feature = "metrics")]
type LabelSet = SmallVec<[Label; 3]>;

#[cfg(feature = "metrics")]
const METRIC_TOKENS_ISSUED_TOTAL: &str = "jwt_issuer_tokens_issued_total";
#[cfg(feature = "metrics")]
const METRIC_TOKEN_FAILURES_TOTAL: &str = "jwt_issuer_token_failures_total";
/// Label value used when a failure cannot be attributed to a registered client.
#[cfg(feature = "metrics")]
const UNREGISTERED_CLIENT: &str = "unregistered";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe issuance counters for a single client.
#[derive(Debug, Default)]
pub struct ClientMetrics {
	tokens_issued: AtomicU64,
	tokens_encrypted: AtomicU64,
	failures: AtomicU64,
}
impl ClientMetrics {
	/// Create a new metrics accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record an issued token.
	pub fn record_issued(&self, encrypted: bool) {
		self.tokens_issued.fetch_add(1, Ordering::Relaxed);
		if encrypted {
			self.tokens_encrypted.fetch_add(1, Ordering::Relaxed);
		}
	}

	/// Record a request that resolved the client but failed to produce a token.
	pub fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for status reporting.
	pub fn snapshot(&self) -> ClientMetricsSnapshot {
		ClientMetricsSnapshot {
			tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
			tokens_encrypted: self.tokens_encrypted.load(Ordering::Relaxed),
			failures: self.failures.load(Ordering::Relaxed),
		}
	}
}

/// Read-only snapshot of per-client counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientMetricsSnapshot {
	/// Tokens issued, encrypted or not.
	pub tokens_issued: u64,
	/// Issued tokens that were wrapped in a JWE.
	pub tokens_encrypted: u64,
	/// Failed issuance attempts.
	pub failures: u64,
}
impl ClientMetricsSnapshot {
	/// Share of issuance attempts that failed.
	pub fn failure_rate(&self) -> f64 {
		let attempts = self.tokens_issued + self.failures;

		if attempts == 0 { 0.0 } else { self.failures as f64 / attempts as f64 }
	}
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

#[cfg(feature = "metrics")]
pub(crate) fn record_token_issued(client: &str, encrypted: bool) {
	let mut labels = client_labels(Some(client));

	labels.push(Label::new("encrypted", if encrypted { "true" } else { "false" }));

	metrics::counter!(METRIC_TOKENS_ISSUED_TOTAL, labels.iter()).increment(1);
}
#[cfg(not(feature = "metrics"))]
pub(crate) fn record_token_issued(_client: &str, _encrypted: bool) {}

#[cfg(feature = "metrics")]
pub(crate) fn record_token_failure(client: Option<&str>, error: &Error) {
	let mut labels = client_labels(client);

	labels.push(Label::new("kind", error.kind().as_str()));

	metrics::counter!(METRIC_TOKEN_FAILURES_TOTAL, labels.iter()).increment(1);
}
#[cfg(not(feature = "metrics"))]
pub(crate) fn record_token_failure(_client: Option<&str>, _error: &Error) {}

#[cfg(feature = "metrics")]
fn client_labels(client: Option<&str>) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("client", client.unwrap_or(UNREGISTERED_CLIENT).to_owned()));

	labels
}
