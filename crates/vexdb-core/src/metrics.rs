//! Central metrics registry and metric definitions
//!
//! Prometheus metrics for the master catalog and the data node replica.
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

// ===== Catalog Metrics =====

/// Catalog requests by operation and outcome
pub static CATALOG_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vexdb_catalog_requests_total",
        "Total number of catalog requests",
        &["operation", "status"]
    )
    .expect("Failed to register catalog request counter")
});

/// Requests rejected by the timestamp barrier
pub static TIMESTAMP_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "vexdb_timestamp_rejections_total",
        "Total number of requests rejected as stale or duplicated",
        &["operation"]
    )
    .expect("Failed to register timestamp rejection counter")
});

/// Last timestamp accepted by the catalog barrier
pub static CATALOG_WATERMARK: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vexdb_catalog_watermark",
        "Last timestamp accepted by the catalog barrier"
    )
    .expect("Failed to register catalog watermark gauge")
});

// ===== Data Node Metrics =====

/// Live segments tracked by the replica
pub static DATANODE_SEGMENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "vexdb_datanode_segments",
        "Number of segments tracked by the data node replica"
    )
    .expect("Failed to register data node segment gauge")
});

/// Rows added through statistics updates
pub static ROWS_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vexdb_datanode_rows_ingested_total",
        "Total number of rows accounted to segments"
    )
    .expect("Failed to register rows ingested counter")
});

/// Segment statistics updates handed to the reporting sink
pub static SEGMENT_STATS_REPORTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "vexdb_segment_stats_reported_total",
        "Total number of segment statistics updates reported"
    )
    .expect("Failed to register segment stats counter")
});

/// Records the outcome of one catalog request.
pub fn record_catalog_request<T>(operation: &str, result: &crate::CoreResult<T>) {
    let status = match result {
        Ok(_) => "success",
        Err(err) => {
            if err.is_stale_timestamp() {
                TIMESTAMP_REJECTIONS.with_label_values(&[operation]).inc();
            }
            err.kind()
        }
    };
    CATALOG_REQUESTS.with_label_values(&[operation, status]).inc();
}
