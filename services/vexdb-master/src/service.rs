//! Request/response boundary of the master.
//!
//! Proxies send timestamped requests; every response carries a [`Status`] whose
//! error code is either `SUCCESS` or `UNEXPECTED_ERROR`, with the catalog error's
//! message as the reason. The transport that carries these messages lives elsewhere.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use vexdb_core::{CollectionId, CollectionSchema, CoreResult, Timestamp, UniqueId};

use crate::meta_table::MetaTable;

/// Fields common to every proxy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub timestamp: Timestamp,
    pub caller_id: UniqueId,
    pub request_id: UniqueId,
}

impl RequestHeader {
    #[must_use]
    pub const fn new(timestamp: Timestamp, caller_id: UniqueId, request_id: UniqueId) -> Self {
        Self {
            timestamp,
            caller_id,
            request_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionName {
    pub collection_name: String,
    pub tag: String,
}

impl PartitionName {
    #[must_use]
    pub fn new(collection_name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            tag: tag.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub collection_name: String,
    pub schema: CollectionSchema,
}

/// Request naming a single collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub collection_name: String,
}

pub type DropCollectionRequest = CollectionRequest;
pub type HasCollectionRequest = CollectionRequest;
pub type DescribeCollectionRequest = CollectionRequest;
pub type ShowPartitionRequest = CollectionRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowCollectionRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
}

/// Request naming a single partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionRequest {
    #[serde(flatten)]
    pub header: RequestHeader,
    pub partition_name: PartitionName,
}

pub type CreatePartitionRequest = PartitionRequest;
pub type DropPartitionRequest = PartitionRequest;
pub type HasPartitionRequest = PartitionRequest;
pub type DescribePartitionRequest = PartitionRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Success,
    UnexpectedError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub error_code: ErrorCode,
    #[serde(default)]
    pub reason: String,
}

impl Status {
    #[must_use]
    pub fn success() -> Self {
        Self {
            error_code: ErrorCode::Success,
            reason: String::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error_code == ErrorCode::Success
    }

    fn from_result<T>(result: &CoreResult<T>) -> Self {
        match result {
            Ok(_) => Self::success(),
            Err(err) => Self {
                error_code: ErrorCode::UnexpectedError,
                reason: err.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolResponse {
    pub status: Status,
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringListResponse {
    pub status: Status,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescription {
    pub status: Status,
    pub collection_id: Option<CollectionId>,
    pub schema: Option<CollectionSchema>,
    pub create_time: Timestamp,
    pub partition_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionDescription {
    pub status: Status,
    pub name: Option<PartitionName>,
    pub create_time: Timestamp,
}

/// Handles proxy requests against one catalog.
#[derive(Clone)]
pub struct MasterService {
    meta_table: Arc<MetaTable>,
}

impl MasterService {
    #[must_use]
    pub fn new(meta_table: Arc<MetaTable>) -> Self {
        Self { meta_table }
    }

    /// Catalog handle for internal callers.
    #[must_use]
    pub fn meta_table(&self) -> &Arc<MetaTable> {
        &self.meta_table
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.collection_name
        )
    )]
    pub fn create_collection(&self, req: CreateCollectionRequest) -> Status {
        let result = self.meta_table.create_collection(
            req.header.timestamp,
            &req.collection_name,
            req.schema,
        );
        Status::from_result(&result)
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.collection_name
        )
    )]
    pub fn drop_collection(&self, req: DropCollectionRequest) -> Status {
        let result = self
            .meta_table
            .drop_collection(req.header.timestamp, &req.collection_name);
        Status::from_result(&result)
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.collection_name
        )
    )]
    pub fn has_collection(&self, req: HasCollectionRequest) -> BoolResponse {
        let result = self
            .meta_table
            .has_collection(req.header.timestamp, &req.collection_name);
        BoolResponse {
            status: Status::from_result(&result),
            value: result.unwrap_or(false),
        }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.collection_name
        )
    )]
    pub fn describe_collection(&self, req: DescribeCollectionRequest) -> CollectionDescription {
        let result = self
            .meta_table
            .describe_collection(req.header.timestamp, &req.collection_name);
        let status = Status::from_result(&result);
        match result {
            Ok(meta) => CollectionDescription {
                status,
                collection_id: Some(meta.id),
                create_time: meta.create_time,
                partition_tags: meta.partition_tags(),
                schema: Some(meta.schema),
            },
            Err(_) => CollectionDescription {
                status,
                collection_id: None,
                schema: None,
                create_time: 0,
                partition_tags: Vec::new(),
            },
        }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id
        )
    )]
    pub fn show_collections(&self, req: ShowCollectionRequest) -> StringListResponse {
        let result = self.meta_table.show_collections(req.header.timestamp);
        StringListResponse {
            status: Status::from_result(&result),
            values: result.unwrap_or_default(),
        }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.partition_name.collection_name,
            partition = %req.partition_name.tag
        )
    )]
    pub fn create_partition(&self, req: CreatePartitionRequest) -> Status {
        let result = self.meta_table.create_partition(
            req.header.timestamp,
            &req.partition_name.collection_name,
            &req.partition_name.tag,
        );
        Status::from_result(&result)
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.partition_name.collection_name,
            partition = %req.partition_name.tag
        )
    )]
    pub fn drop_partition(&self, req: DropPartitionRequest) -> Status {
        let result = self.meta_table.drop_partition(
            req.header.timestamp,
            &req.partition_name.collection_name,
            &req.partition_name.tag,
        );
        Status::from_result(&result)
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.partition_name.collection_name,
            partition = %req.partition_name.tag
        )
    )]
    pub fn has_partition(&self, req: HasPartitionRequest) -> BoolResponse {
        let result = self.meta_table.has_partition(
            req.header.timestamp,
            &req.partition_name.collection_name,
            &req.partition_name.tag,
        );
        BoolResponse {
            status: Status::from_result(&result),
            value: result.unwrap_or(false),
        }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.collection_name
        )
    )]
    pub fn show_partitions(&self, req: ShowPartitionRequest) -> StringListResponse {
        let result = self
            .meta_table
            .show_partitions(req.header.timestamp, &req.collection_name);
        StringListResponse {
            status: Status::from_result(&result),
            values: result.unwrap_or_default(),
        }
    }

    #[tracing::instrument(
        skip(self, req),
        fields(
            caller_id = req.header.caller_id,
            request_id = req.header.request_id,
            collection = %req.partition_name.collection_name,
            partition = %req.partition_name.tag
        )
    )]
    pub fn describe_partition(&self, req: DescribePartitionRequest) -> PartitionDescription {
        let result = self.meta_table.describe_partition(
            req.header.timestamp,
            &req.partition_name.collection_name,
            &req.partition_name.tag,
        );
        let status = Status::from_result(&result);
        match result {
            Ok(info) => PartitionDescription {
                status,
                name: Some(PartitionName::new(info.collection_name, info.tag)),
                create_time: info.create_time,
            },
            Err(_) => PartitionDescription {
                status,
                name: None,
                create_time: 0,
            },
        }
    }
}
