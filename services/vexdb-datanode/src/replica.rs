//! In-memory registry of the collections and segments a data node is ingesting.
//!
//! One reader/writer lock covers both maps. Lookups take the shared side; every
//! operation that changes a segment, including taking its statistics update, takes
//! the exclusive side.

use std::collections::HashMap;

use parking_lot::RwLock;
use vexdb_core::metrics::{DATANODE_SEGMENTS, ROWS_INGESTED};
use vexdb_core::{
    CollectionId, CollectionSchema, CoreError, CoreResult, PartitionId, SegmentId,
};

use crate::segment::{Collection, Segment, SegmentStatisticsUpdate};

#[derive(Debug, Default)]
struct ReplicaState {
    collections: HashMap<CollectionId, Collection>,
    segments: HashMap<SegmentId, Segment>,
}

impl ReplicaState {
    fn segment_mut(&mut self, id: SegmentId) -> CoreResult<&mut Segment> {
        self.segments
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found("segment", id))
    }

    fn publish_segment_count(&self) {
        DATANODE_SEGMENTS.set(i64::try_from(self.segments.len()).unwrap_or(i64::MAX));
    }
}

/// Node-side replica state tracker.
#[derive(Debug, Default)]
pub struct CollectionReplica {
    state: RwLock<ReplicaState>,
}

impl CollectionReplica {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a collection under `id`, named after its schema.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if `id` is already registered.
    pub fn add_collection(&self, id: CollectionId, schema: CollectionSchema) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.collections.contains_key(&id) {
            return Err(CoreError::already_exists("collection", id));
        }

        let name = schema.name.clone();
        tracing::info!(collection_id = %id, collection = %name, "Added collection to replica");
        state.collections.insert(id, Collection { id, name, schema });
        Ok(())
    }

    /// Forgets a collection. Its segments are left to the caller.
    pub fn remove_collection(&self, id: CollectionId) -> CoreResult<()> {
        let removed = self.state.write().collections.remove(&id);
        match removed {
            Some(collection) => {
                tracing::info!(
                    collection_id = %id,
                    collection = %collection.name,
                    "Removed collection from replica"
                );
                Ok(())
            }
            None => Err(CoreError::not_found("collection", id)),
        }
    }

    pub fn get_collection_by_id(&self, id: CollectionId) -> CoreResult<Collection> {
        self.state
            .read()
            .collections
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("collection", id))
    }

    #[must_use]
    pub fn has_collection(&self, id: CollectionId) -> bool {
        self.state.read().collections.contains_key(&id)
    }

    #[must_use]
    pub fn collection_num(&self) -> usize {
        self.state.read().collections.len()
    }

    /// Starts tracking a new segment fed from `channel_name`.
    ///
    /// The channel head becomes the segment's start position, reported by the first
    /// [`take_statistics_update`](Self::take_statistics_update) and never again.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the segment is already tracked.
    pub fn add_segment(
        &self,
        id: SegmentId,
        collection_id: CollectionId,
        partition_id: PartitionId,
        channel_name: &str,
    ) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.segments.contains_key(&id) {
            return Err(CoreError::already_exists("segment", id));
        }

        state.segments.insert(
            id,
            Segment::new(id, collection_id, partition_id, channel_name.to_string()),
        );
        state.publish_segment_count();

        tracing::info!(
            segment_id = %id,
            collection_id = %collection_id,
            partition_id = %partition_id,
            channel = channel_name,
            "Added segment"
        );
        Ok(())
    }

    pub fn remove_segment(&self, id: SegmentId) -> CoreResult<()> {
        let mut state = self.state.write();
        if state.segments.remove(&id).is_none() {
            return Err(CoreError::not_found("segment", id));
        }
        state.publish_segment_count();

        tracing::info!(segment_id = %id, "Removed segment");
        Ok(())
    }

    #[must_use]
    pub fn has_segment(&self, id: SegmentId) -> bool {
        self.state.read().segments.contains_key(&id)
    }

    /// Snapshot of one segment.
    pub fn get_segment_by_id(&self, id: SegmentId) -> CoreResult<Segment> {
        self.state
            .read()
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("segment", id))
    }

    /// Adds `delta_rows` ingested rows to a segment.
    ///
    /// The memory estimate is reset to zero until the next
    /// [`set_memory_size`](Self::set_memory_size).
    ///
    /// # Errors
    ///
    /// `NotFound` if the segment is absent; `InvalidArgument` for a negative delta or
    /// a row count that would overflow. A rejected update leaves the segment as it was.
    pub fn update_statistics(&self, id: SegmentId, delta_rows: i64) -> CoreResult<()> {
        let rows = u64::try_from(delta_rows).map_err(|_| {
            CoreError::invalid_argument(format!("negative row delta {delta_rows} for segment {id}"))
        })?;

        let mut state = self.state.write();
        let segment = state.segment_mut(id)?;
        segment.num_rows = segment.num_rows.checked_add(delta_rows).ok_or_else(|| {
            CoreError::invalid_argument(format!("row count of segment {id} would overflow"))
        })?;
        segment.memory_size = 0;

        ROWS_INGESTED.inc_by(rows);
        tracing::debug!(
            segment_id = %id,
            delta_rows,
            num_rows = segment.num_rows,
            "Updated segment statistics"
        );
        Ok(())
    }

    /// Records a recomputed memory estimate for a segment.
    pub fn set_memory_size(&self, id: SegmentId, memory_size: i64) -> CoreResult<()> {
        self.state.write().segment_mut(id)?.memory_size = memory_size;
        Ok(())
    }

    /// Takes the current statistics of a segment.
    ///
    /// This is a write: the first call after [`add_segment`](Self::add_segment)
    /// carries the start position and clears the new-segment flag, so concurrent
    /// callers can never both observe `is_new_segment == true`.
    pub fn take_statistics_update(&self, id: SegmentId) -> CoreResult<SegmentStatisticsUpdate> {
        Ok(self.state.write().segment_mut(id)?.take_update())
    }

    /// Takes the update of every live segment in one critical section.
    pub fn take_all_statistics_updates(&self) -> Vec<SegmentStatisticsUpdate> {
        let mut state = self.state.write();
        let mut updates: Vec<SegmentStatisticsUpdate> =
            state.segments.values_mut().map(Segment::take_update).collect();
        updates.sort_by_key(|u| u.segment_id);
        updates
    }

    /// IDs of all live segments, sorted.
    #[must_use]
    pub fn segment_ids(&self) -> Vec<SegmentId> {
        let mut ids: Vec<SegmentId> = self.state.read().segments.keys().copied().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn segment_num(&self) -> usize {
        self.state.read().segments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vexdb_core::{DataType, FieldSchema};

    fn seg(id: i64) -> SegmentId {
        SegmentId::new(id)
    }

    fn replica_with_segment(id: i64) -> CollectionReplica {
        let replica = CollectionReplica::new();
        replica
            .add_segment(seg(id), CollectionId::new(1), PartitionId::new(1), "insert-ch-0")
            .unwrap();
        replica
    }

    #[test]
    fn test_collection_crud() {
        let replica = CollectionReplica::new();
        let schema =
            CollectionSchema::new("col1", vec![FieldSchema::new("vec", DataType::VectorFloat)]);
        let id = CollectionId::new(7);

        replica.add_collection(id, schema.clone()).unwrap();
        assert_eq!(
            replica.add_collection(id, schema).unwrap_err().kind(),
            "already_exists"
        );
        assert!(replica.has_collection(id));
        assert_eq!(replica.get_collection_by_id(id).unwrap().name, "col1");
        assert_eq!(replica.collection_num(), 1);

        replica.remove_collection(id).unwrap();
        assert!(!replica.has_collection(id));
        assert_eq!(replica.remove_collection(id).unwrap_err().kind(), "not_found");
        assert_eq!(
            replica.get_collection_by_id(id).unwrap_err(),
            CoreError::not_found("collection", 7)
        );
    }

    #[test]
    fn test_duplicate_segment() {
        let replica = replica_with_segment(1);
        let err = replica
            .add_segment(seg(1), CollectionId::new(1), PartitionId::new(2), "other")
            .unwrap_err();
        assert_eq!(err.kind(), "already_exists");
        assert_eq!(replica.get_segment_by_id(seg(1)).unwrap().channel_name, "insert-ch-0");
    }

    #[test]
    fn test_update_statistics_resets_memory_size() {
        let replica = replica_with_segment(1);
        replica.set_memory_size(seg(1), 4096).unwrap();
        replica.update_statistics(seg(1), 10).unwrap();

        let segment = replica.get_segment_by_id(seg(1)).unwrap();
        assert_eq!(segment.num_rows, 10);
        assert_eq!(segment.memory_size, 0);
    }

    #[test]
    fn test_rejected_row_delta_leaves_segment_unchanged() {
        let replica = replica_with_segment(1);
        replica.update_statistics(seg(1), i64::MAX).unwrap();
        replica.set_memory_size(seg(1), 512).unwrap();

        let err = replica.update_statistics(seg(1), 1).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        let err = replica.update_statistics(seg(1), -5).unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");

        let segment = replica.get_segment_by_id(seg(1)).unwrap();
        assert_eq!(segment.num_rows, i64::MAX);
        assert_eq!(segment.memory_size, 512);
    }

    #[test]
    fn test_unknown_segment() {
        let replica = CollectionReplica::new();
        assert_eq!(replica.update_statistics(seg(9), 1).unwrap_err().kind(), "not_found");
        assert_eq!(replica.take_statistics_update(seg(9)).unwrap_err().kind(), "not_found");
        assert_eq!(replica.remove_segment(seg(9)).unwrap_err().kind(), "not_found");
        assert_eq!(replica.set_memory_size(seg(9), 1).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_take_all_statistics_updates() {
        let replica = replica_with_segment(2);
        replica
            .add_segment(seg(1), CollectionId::new(1), PartitionId::new(1), "insert-ch-1")
            .unwrap();
        replica.take_statistics_update(seg(2)).unwrap();

        let updates = replica.take_all_statistics_updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].segment_id, seg(1));
        assert!(updates[0].is_new_segment);
        assert!(!updates[1].is_new_segment);

        assert!(replica
            .take_all_statistics_updates()
            .iter()
            .all(|u| u.start_position.is_none()));
        assert_eq!(replica.segment_ids(), vec![seg(1), seg(2)]);
    }
}
