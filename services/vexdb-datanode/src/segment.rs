use serde::{Deserialize, Serialize};
use vexdb_core::{CollectionId, CollectionSchema, PartitionId, SegmentId, Timestamp};

/// Offset in an ingest channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgPosition {
    pub channel_name: String,
    pub msg_id: String,
    pub timestamp: Timestamp,
}

impl MsgPosition {
    /// Position at the head of `channel_name`.
    #[must_use]
    pub fn channel_start(channel_name: impl Into<String>) -> Self {
        Self {
            channel_name: channel_name.into(),
            msg_id: String::new(),
            timestamp: 0,
        }
    }
}

/// Statistics diff for one segment, as forwarded downstream.
///
/// `start_position` is present only in the first update taken for a segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentStatisticsUpdate {
    pub segment_id: SegmentId,
    pub memory_size: i64,
    pub num_rows: i64,
    pub is_new_segment: bool,
    pub start_position: Option<MsgPosition>,
}

/// A collection as known to one data node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub schema: CollectionSchema,
}

/// Growing unit of ingested rows bound to one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub collection_id: CollectionId,
    pub partition_id: PartitionId,
    pub channel_name: String,
    pub num_rows: i64,
    pub memory_size: i64,
    pub is_new: bool,
    pub start_position: MsgPosition,
}

impl Segment {
    pub(crate) fn new(
        id: SegmentId,
        collection_id: CollectionId,
        partition_id: PartitionId,
        channel_name: String,
    ) -> Self {
        let start_position = MsgPosition::channel_start(channel_name.clone());
        Self {
            id,
            collection_id,
            partition_id,
            channel_name,
            num_rows: 0,
            memory_size: 0,
            is_new: true,
            start_position,
        }
    }

    /// Builds the next statistics update and clears the new-segment flag.
    pub(crate) fn take_update(&mut self) -> SegmentStatisticsUpdate {
        let start_position = if self.is_new {
            self.is_new = false;
            Some(self.start_position.clone())
        } else {
            None
        };

        SegmentStatisticsUpdate {
            segment_id: self.id,
            memory_size: self.memory_size,
            num_rows: self.num_rows,
            is_new_segment: start_position.is_some(),
            start_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_update_reports_start_once() {
        let mut segment = Segment::new(
            SegmentId::new(1),
            CollectionId::new(2),
            PartitionId::new(3),
            "insert-ch-0".to_string(),
        );

        let first = segment.take_update();
        assert!(first.is_new_segment);
        assert_eq!(
            first.start_position.map(|p| p.channel_name).as_deref(),
            Some("insert-ch-0")
        );

        let second = segment.take_update();
        assert!(!second.is_new_segment);
        assert!(second.start_position.is_none());
    }
}
