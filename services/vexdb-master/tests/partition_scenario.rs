//! End-to-end catalog behaviour through the request boundary.

use std::sync::Arc;

use vexdb_core::{
    CollectionSchema, CoreError, CoreResult, DataType, FieldSchema, KvBase, MasterConfig,
    MemoryKv,
};
use vexdb_master::{
    CollectionRequest, CreateCollectionRequest, ErrorCode, MasterService, MetaTable,
    PartitionName, PartitionRequest, RequestHeader,
};

fn schema(name: &str) -> CollectionSchema {
    CollectionSchema::new(
        name,
        vec![
            FieldSchema::new("id", DataType::Int64),
            FieldSchema::new("vec", DataType::VectorFloat)
                .with_type_param("dim", "16")
                .with_index_param("metric_type", "L2"),
        ],
    )
}

fn header(ts: u64) -> RequestHeader {
    RequestHeader::new(ts, 1, ts as i64)
}

fn partition(ts: u64, collection: &str, tag: &str) -> PartitionRequest {
    PartitionRequest {
        header: header(ts),
        partition_name: PartitionName::new(collection, tag),
    }
}

fn collection(ts: u64, name: &str) -> CollectionRequest {
    CollectionRequest {
        header: header(ts),
        collection_name: name.to_string(),
    }
}

fn service_over(store: Arc<dyn KvBase>) -> MasterService {
    let table = MetaTable::open(store, MasterConfig::default()).unwrap();
    MasterService::new(Arc::new(table))
}

fn stale(ts: u64, watermark: u64) -> String {
    CoreError::stale_timestamp(ts, watermark).to_string()
}

#[test]
fn test_partition_lifecycle() {
    let svc = service_over(Arc::new(MemoryKv::new()));

    let status = svc.create_collection(CreateCollectionRequest {
        header: header(1),
        collection_name: "col1".to_string(),
        schema: schema("col1"),
    });
    assert_eq!(status.error_code, ErrorCode::Success);

    assert!(svc.create_partition(partition(2, "col1", "p1")).is_success());

    let replay = svc.create_partition(partition(1, "col1", "p1"));
    assert_eq!(replay.error_code, ErrorCode::UnexpectedError);
    assert_eq!(replay.reason, stale(1, 2));

    assert!(svc.create_partition(partition(3, "col1", "p2")).is_success());

    let shown = svc.show_partitions(collection(4, "col1"));
    assert!(shown.status.is_success());
    assert_eq!(shown.values, vec!["_default", "p1", "p2"]);
    assert_eq!(svc.meta_table().watermark(), 4);

    let shown = svc.show_partitions(collection(3, "col1"));
    assert_eq!(shown.status.reason, stale(3, 4));
    assert!(shown.values.is_empty());

    let has = svc.has_partition(partition(5, "col1", "p1"));
    assert!(has.status.is_success());
    assert!(has.value);

    assert!(svc.drop_partition(partition(7, "col1", "p2")).is_success());
    let replay = svc.drop_partition(partition(6, "col1", "p2"));
    assert_eq!(replay.reason, stale(6, 7));

    let has = svc.has_partition(partition(8, "col1", "p2"));
    assert!(has.status.is_success());
    assert!(!has.value);

    let described = svc.describe_partition(partition(9, "col1", "p1"));
    assert!(described.status.is_success());
    assert_eq!(described.name, Some(PartitionName::new("col1", "p1")));
    assert_eq!(described.create_time, 2);

    let described = svc.describe_partition(partition(8, "col1", "p1"));
    assert_eq!(described.status.reason, stale(8, 9));
    assert_eq!(described.name, None);
}

#[test]
fn test_watermark_is_shared_across_collections() {
    let svc = service_over(Arc::new(MemoryKv::new()));
    for (ts, name) in [(1, "a"), (2, "b")] {
        assert!(svc
            .create_collection(CreateCollectionRequest {
                header: header(ts),
                collection_name: name.to_string(),
                schema: schema(name),
            })
            .is_success());
    }

    assert!(svc.create_partition(partition(10, "a", "p1")).is_success());
    let other = svc.create_partition(partition(5, "b", "p1"));
    assert_eq!(other.reason, stale(5, 10));

    let listed = svc.show_collections(vexdb_master::ShowCollectionRequest { header: header(11) });
    assert_eq!(listed.values, vec!["a", "b"]);
}

#[test]
fn test_has_partition_of_missing_collection() {
    let svc = service_over(Arc::new(MemoryKv::new()));
    let has = svc.has_partition(partition(1, "nope", "p1"));
    assert_eq!(has.status.error_code, ErrorCode::UnexpectedError);
    assert_eq!(has.status.reason, "collection `nope` was not found");
    assert!(!has.value);
    assert_eq!(svc.meta_table().watermark(), 0);
}

#[test]
fn test_catalog_reloads_from_store() {
    let store: Arc<dyn KvBase> = Arc::new(MemoryKv::new());
    {
        let table = MetaTable::open(Arc::clone(&store), MasterConfig::default()).unwrap();
        table.create_collection(1, "col1", schema("col1")).unwrap();
        table.create_collection(2, "col2", schema("col2")).unwrap();
        table.create_partition(3, "col1", "p1").unwrap();
        table.drop_collection(4, "col2").unwrap();
    }

    let table = MetaTable::open(Arc::clone(&store), MasterConfig::default()).unwrap();
    assert_eq!(table.collection_count(), 1);
    assert_eq!(table.watermark(), 0);
    assert_eq!(table.show_partitions(1, "col1").unwrap(), vec!["_default", "p1"]);

    // ids are never reused, even for dropped collections
    let id = table.create_collection(2, "col3", schema("col3")).unwrap();
    assert_eq!(id.get(), 3);

    let keys = store.load_with_prefix("/vexdb/meta/collection/").unwrap().0;
    assert_eq!(keys.len(), 2);
    assert_eq!(store.load("/vexdb/kv/collection_id_allocator").unwrap(), "4");
}

/// Store whose saves fail after a configurable number of successes.
struct FailingKv {
    inner: MemoryKv,
    saves_left: parking_lot::Mutex<usize>,
}

impl FailingKv {
    fn new(saves_left: usize) -> Self {
        Self {
            inner: MemoryKv::new(),
            saves_left: parking_lot::Mutex::new(saves_left),
        }
    }

    fn take_save(&self) -> CoreResult<()> {
        let mut left = self.saves_left.lock();
        if *left == 0 {
            return Err(CoreError::internal("disk full"));
        }
        *left -= 1;
        Ok(())
    }
}

impl KvBase for FailingKv {
    fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        self.take_save()?;
        self.inner.save(key, value)
    }

    fn load(&self, key: &str) -> CoreResult<String> {
        self.inner.load(key)
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.inner.remove(key)
    }

    fn load_range(
        &self,
        low: &str,
        high: &str,
        limit: usize,
    ) -> CoreResult<(Vec<String>, Vec<String>)> {
        self.inner.load_range(low, high, limit)
    }
}

#[test]
fn test_persistence_failure_leaves_catalog_untouched() {
    // collection entry + allocator succeed, the partition write fails
    let table = MetaTable::open(Arc::new(FailingKv::new(2)), MasterConfig::default()).unwrap();
    table.create_collection(1, "col1", schema("col1")).unwrap();

    let err = table.create_partition(2, "col1", "p1").unwrap_err();
    assert_eq!(err.kind(), "internal");
    assert_eq!(table.watermark(), 1);

    assert!(!table.has_partition(2, "col1", "p1").unwrap());
    assert_eq!(table.watermark(), 2);
}

#[test]
fn test_failed_create_collection_rolls_back_store() {
    // the collection entry is written, the allocator write fails
    let store = Arc::new(FailingKv::new(1));
    let table = MetaTable::open(store.clone(), MasterConfig::default()).unwrap();

    let err = table.create_collection(1, "col1", schema("col1")).unwrap_err();
    assert_eq!(err.kind(), "internal");
    assert_eq!(table.watermark(), 0);
    assert_eq!(table.collection_count(), 0);
    assert!(store.inner.is_empty());

    let reopened = MetaTable::open(store, MasterConfig::default()).unwrap();
    assert_eq!(reopened.collection_count(), 0);
}

#[test]
fn test_concurrent_requests_accept_each_timestamp_once() {
    let table =
        Arc::new(MetaTable::open(Arc::new(MemoryKv::new()), MasterConfig::default()).unwrap());
    table.create_collection(1, "col1", schema("col1")).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                let mut accepted = Vec::new();
                for ts in 2..200u64 {
                    if table
                        .create_partition(ts, "col1", &format!("p{worker}_{ts}"))
                        .is_ok()
                    {
                        accepted.push(ts);
                    }
                }
                accepted
            })
        })
        .collect();

    let mut accepted: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let total = accepted.len();
    accepted.sort_unstable();
    accepted.dedup();

    assert_eq!(accepted.len(), total, "a timestamp was accepted twice");
    let partitions = table.get_collection_by_name("col1").unwrap().partitions.len();
    assert_eq!(partitions, total + 1);
    assert_eq!(table.watermark(), *accepted.last().unwrap());
}
