//! Counters for the compositor run, named with Prometheus conventions.
//!
//! Recording is a no-op until [`init`] installs the recorder, so library
//! code and tests can call these freely.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::sync::OnceLock;
use tracing::info;

/// Every metric name emitted by the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    SourceRowsRead,
    ClassifyFieldsPresent,
    MergeRecordsWritten,
    MergeOriginMissing,
    Runs,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceRowsRead => "compositor_rows_read_total",
            MetricName::ClassifyFieldsPresent => "compositor_records_classified_total",
            MetricName::MergeRecordsWritten => "compositor_records_written_total",
            MetricName::MergeOriginMissing => "compositor_records_origin_missing_total",
            MetricName::Runs => "compositor_runs_total",
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            SourceRowsRead,
            ClassifyFieldsPresent,
            MergeRecordsWritten,
            MergeOriginMissing,
            Runs,
        ]
        .into_iter()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call more than once.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    for name in MetricName::all_metrics() {
        ::metrics::describe_counter!(name.as_str(), name.as_str());
    }
    let _ = METRICS_HANDLE.set(handle);
    info!("Metrics system initialized");
    Ok(())
}

/// Prometheus text exposition of everything recorded so far
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub mod source {
    use super::MetricName;
    use crate::domain::Shape;

    pub fn row_read(shape: Shape) {
        ::metrics::counter!(MetricName::SourceRowsRead.as_str(), "shape" => shape.as_str())
            .increment(1);
    }
}

pub mod classify {
    use super::MetricName;
    use crate::domain::ClassifiedRecord;

    /// Count which optional fields the classifiers filled in
    pub fn record_classified(record: &ClassifiedRecord) {
        let present = [
            ("display_class", record.display_class.is_some()),
            ("address", record.address.is_some()),
            ("website", record.website.is_some()),
            ("phone", record.phone.is_some()),
        ];
        for (field, is_present) in present {
            if is_present {
                ::metrics::counter!(MetricName::ClassifyFieldsPresent.as_str(), "field" => field)
                    .increment(1);
            }
        }
    }
}

pub mod merge {
    use super::MetricName;

    pub fn record_written() {
        ::metrics::counter!(MetricName::MergeRecordsWritten.as_str()).increment(1);
    }

    pub fn origin_missing() {
        ::metrics::counter!(MetricName::MergeOriginMissing.as_str()).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn finished(outcome: &'static str) {
        ::metrics::counter!(MetricName::Runs.as_str(), "outcome" => outcome).increment(1);
    }
}
