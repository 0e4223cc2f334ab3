use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, Timestamp};
use crate::schema::CollectionSchema;

/// Partition tag created implicitly with every collection.
pub const DEFAULT_PARTITION_TAG: &str = "_default";

/// Catalog record of one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub tag: String,
    /// Timestamp of the request that created the partition.
    pub create_time: Timestamp,
}

/// Catalog record of one collection, as persisted by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub id: CollectionId,
    pub schema: CollectionSchema,
    /// Timestamp of the request that created the collection.
    pub create_time: Timestamp,
    pub partitions: Vec<PartitionMeta>,
}

impl CollectionMeta {
    /// Creates a collection record seeded with the default partition.
    #[must_use]
    pub fn new(
        id: CollectionId,
        name: &str,
        mut schema: CollectionSchema,
        create_time: Timestamp,
        default_tag: &str,
    ) -> Self {
        if schema.name.is_empty() {
            schema.name = name.to_string();
        }
        Self {
            id,
            schema,
            create_time,
            partitions: vec![PartitionMeta {
                tag: default_tag.to_string(),
                create_time,
            }],
        }
    }

    /// Collection name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    #[must_use]
    pub fn partition(&self, tag: &str) -> Option<&PartitionMeta> {
        self.partitions.iter().find(|p| p.tag == tag)
    }

    #[must_use]
    pub fn has_partition(&self, tag: &str) -> bool {
        self.partition(tag).is_some()
    }

    /// Partition tags in creation order.
    #[must_use]
    pub fn partition_tags(&self) -> Vec<String> {
        self.partitions.iter().map(|p| p.tag.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DataType, FieldSchema};

    #[test]
    fn test_new_collection_has_default_partition() {
        let schema = CollectionSchema::new("", vec![FieldSchema::new("v", DataType::VectorFloat)]);
        let meta =
            CollectionMeta::new(CollectionId::new(1), "col1", schema, 5, DEFAULT_PARTITION_TAG);

        assert_eq!(meta.name(), "col1");
        assert_eq!(meta.partition_tags(), vec![DEFAULT_PARTITION_TAG.to_string()]);
        assert_eq!(meta.partition(DEFAULT_PARTITION_TAG).unwrap().create_time, 5);
        assert!(!meta.has_partition("p1"));
    }
}
