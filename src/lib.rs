//! Narrative Flux - Deterministic compute engine for narrative-strength indices
//!
//! Narrative Flux turns classified social-signal messages into a daily
//! narrative-strength index per tracked entity and locale through a
//! deterministic pipeline: aggregation → composite index → smoothing →
//! momentum → trend forecast → narrative composite → response encoding.
//!
//! ## Modules
//!
//! - **Pipeline**: Stateless batch computation and the store-backed `NarrativeProcessor`
//! - **Service**: Async refresh of series from an upstream message source, with
//!   request coalescing and a stale-while-revalidate cache

pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod forecast;
pub mod index;
pub mod momentum;
pub mod narrative;
pub mod pipeline;
pub mod schema;
pub mod service;
pub mod singleflight;
pub mod smoother;
pub mod store;
pub mod timeline;
pub mod types;
pub mod upstream;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::NarrativeConfig;
pub use error::{ComputeError, SeriesFailure};
pub use pipeline::{
    aggregates_to_batch, compute_request_json, compute_series, messages_to_batch, BatchReport,
    ComputeRequest, NarrativeProcessor,
};
pub use service::NarrativeService;
pub use store::IndexStore;
pub use types::{
    AuxiliaryIndicators, DailyAggregate, ForecastPoint, IndexPoint, NarrativeResponse,
    NarrativeScore, SeriesKey, SeriesOutput,
};
pub use upstream::{CachedSource, MessageSource};

// Schema exports
pub use schema::{ClassifiedMessage, InputAdapter, SCHEMA_VERSION};

/// Library version embedded in all responses
pub const NARRATIVE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for responses
pub const PRODUCER_NAME: &str = "narrative-flux";
