//! Core domain types and traits shared by the VexDB master and data nodes.

pub mod collection;
pub mod config;
pub mod error;
pub mod ids;
pub mod kv;
pub mod metrics;
pub mod schema;
pub mod telemetry;
pub mod traits;

pub use collection::{CollectionMeta, PartitionMeta, DEFAULT_PARTITION_TAG};
pub use config::{DataNodeConfig, MasterConfig, ParamTable, VexConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{CollectionId, PartitionId, SegmentId, Timestamp, UniqueId};
pub use kv::{MemoryKv, RootedKv};
pub use schema::{CollectionSchema, DataType, FieldSchema, KeyValuePair, MetricType};
pub use traits::KvBase;
