//! Master-side catalog: the timestamp barrier, the collection/partition meta table
//! and the request boundary that proxies talk to.

pub mod barrier;
pub mod meta_table;
pub mod service;

pub use barrier::TimestampBarrier;
pub use meta_table::{MetaTable, PartitionInfo};
pub use service::{
    BoolResponse, CollectionDescription, CollectionRequest, CreateCollectionRequest,
    CreatePartitionRequest, DescribeCollectionRequest, DescribePartitionRequest,
    DropCollectionRequest, DropPartitionRequest, ErrorCode, HasCollectionRequest,
    HasPartitionRequest, MasterService, PartitionDescription, PartitionName, PartitionRequest,
    RequestHeader, ShowCollectionRequest, ShowPartitionRequest, Status, StringListResponse,
};
