//! Data node replica state: the collections and segments a node is ingesting, their
//! row statistics, and the worker that reports those statistics downstream.

pub mod replica;
pub mod reporter;
pub mod segment;

pub use replica::CollectionReplica;
pub use reporter::{StatisticsBatch, StatisticsReporter};
pub use segment::{Collection, MsgPosition, Segment, SegmentStatisticsUpdate};
