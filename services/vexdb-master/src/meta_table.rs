//! Timestamp-ordered catalog of collections and partitions.
//!
//! Every timestamped operation runs under the catalog's write lock: the barrier
//! check, the mutation or read, the persistence write and the watermark advance all
//! happen inside one critical section. A request whose timestamp does not exceed the
//! watermark is rejected before it touches anything, and a request that fails for
//! any other reason leaves both the catalog and the watermark as they were.
//!
//! The watermark is global to the catalog instance: collection- and partition-level
//! operations on any collection share one total order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use vexdb_core::metrics::{record_catalog_request, CATALOG_WATERMARK};
use vexdb_core::{
    CollectionId, CollectionMeta, CollectionSchema, CoreError, CoreResult, KvBase, MasterConfig,
    PartitionMeta, RootedKv, Timestamp, UniqueId,
};

use crate::barrier::TimestampBarrier;

const COLLECTION_PREFIX: &str = "collection/";
const ID_ALLOCATOR_KEY: &str = "collection_id_allocator";

fn collection_key(id: CollectionId) -> String {
    format!("{COLLECTION_PREFIX}{id}")
}

/// Description of one partition returned by [`MetaTable::describe_partition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    pub collection_name: String,
    pub tag: String,
    pub create_time: Timestamp,
}

#[derive(Debug)]
struct CatalogState {
    barrier: TimestampBarrier,
    collections: HashMap<CollectionId, CollectionMeta>,
    names: HashMap<String, CollectionId>,
    next_id: UniqueId,
}

impl CatalogState {
    fn by_name(&self, name: &str) -> CoreResult<&CollectionMeta> {
        self.names
            .get(name)
            .and_then(|id| self.collections.get(id))
            .ok_or_else(|| CoreError::not_found("collection", name))
    }
}

/// Coordinator-side authority over collection and partition existence.
pub struct MetaTable {
    meta: RootedKv,
    kv: RootedKv,
    config: MasterConfig,
    state: RwLock<CatalogState>,
}

impl MetaTable {
    /// Opens the catalog over `store`, reloading every persisted collection.
    ///
    /// Catalog entries live under `config.meta_root_path`; the ID allocator lives
    /// under `config.kv_root_path`. The barrier of a freshly opened catalog starts
    /// at zero.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the store fails or holds an undecodable entry.
    pub fn open(store: Arc<dyn KvBase>, config: MasterConfig) -> CoreResult<Self> {
        let meta = RootedKv::new(Arc::clone(&store), config.meta_root_path.clone());
        let kv = RootedKv::new(store, config.kv_root_path.clone());

        let (_, values) = meta.load_with_prefix(COLLECTION_PREFIX)?;
        let mut collections = HashMap::with_capacity(values.len());
        let mut names = HashMap::with_capacity(values.len());
        let mut next_id: UniqueId = 1;

        for value in values {
            let collection: CollectionMeta = serde_json::from_str(&value)?;
            if names
                .insert(collection.name().to_string(), collection.id)
                .is_some()
            {
                return Err(CoreError::internal(format!(
                    "duplicate persisted collection name `{}`",
                    collection.name()
                )));
            }
            next_id = next_id.max(collection.id.get() + 1);
            collections.insert(collection.id, collection);
        }

        match kv.load(ID_ALLOCATOR_KEY) {
            Ok(raw) => {
                let persisted: UniqueId = raw.parse().map_err(|_| {
                    CoreError::internal(format!("corrupt collection id allocator: {raw}"))
                })?;
                next_id = next_id.max(persisted);
            }
            Err(CoreError::NotFound { .. }) => {}
            Err(err) => return Err(err),
        }

        tracing::info!(
            collections = collections.len(),
            next_id,
            meta_root = %meta.root(),
            "Catalog loaded"
        );

        Ok(Self {
            meta,
            kv,
            config,
            state: RwLock::new(CatalogState {
                barrier: TimestampBarrier::new(),
                collections,
                names,
                next_id,
            }),
        })
    }

    /// Last timestamp accepted by the catalog.
    #[must_use]
    pub fn watermark(&self) -> Timestamp {
        self.state.read().barrier.watermark()
    }

    /// Runs `op` as the operation stamped `ts`.
    ///
    /// The watermark advances only when `op` succeeds.
    fn gated<T>(
        &self,
        operation: &'static str,
        ts: Timestamp,
        op: impl FnOnce(&mut CatalogState) -> CoreResult<T>,
    ) -> CoreResult<T> {
        let mut state = self.state.write();

        let result = match state.barrier.admit(ts) {
            Ok(()) => op(&mut *state),
            Err(err) => Err(err),
        };

        match &result {
            Ok(_) => {
                state.barrier.commit(ts);
                CATALOG_WATERMARK.set(i64::try_from(ts).unwrap_or(i64::MAX));
                tracing::debug!(operation, ts, "catalog request accepted");
            }
            Err(err) if err.is_stale_timestamp() => {
                tracing::warn!(
                    operation,
                    ts,
                    watermark = state.barrier.watermark(),
                    "rejecting stale or duplicated request"
                );
            }
            Err(err) => {
                tracing::debug!(operation, ts, error = %err, "catalog request failed");
            }
        }

        drop(state);
        record_catalog_request(operation, &result);
        result
    }

    fn persist(&self, collection: &CollectionMeta) -> CoreResult<()> {
        let value = serde_json::to_string(collection)?;
        self.meta.save(&collection_key(collection.id), &value)
    }

    /// Registers a collection seeded with the default partition.
    ///
    /// # Errors
    ///
    /// `StaleOrDuplicateTimestamp`, `InvalidArgument` for a malformed name or schema,
    /// `AlreadyExists` if the name is taken, `Internal` on persistence failure.
    pub fn create_collection(
        &self,
        ts: Timestamp,
        name: &str,
        schema: CollectionSchema,
    ) -> CoreResult<CollectionId> {
        self.gated("create_collection", ts, |state| {
            if name.is_empty() {
                return Err(CoreError::invalid_argument("collection name is empty"));
            }
            schema.validate(name)?;
            if state.names.contains_key(name) {
                return Err(CoreError::already_exists("collection", name));
            }

            let id = CollectionId::new(state.next_id);
            let collection =
                CollectionMeta::new(id, name, schema, ts, &self.config.default_partition_tag);

            self.persist(&collection)?;
            if let Err(err) = self
                .kv
                .save(ID_ALLOCATOR_KEY, &(state.next_id + 1).to_string())
            {
                if let Err(rollback) = self.meta.remove(&collection_key(id)) {
                    tracing::error!(
                        collection = name,
                        collection_id = %id,
                        error = %rollback,
                        "Failed to roll back collection entry"
                    );
                }
                return Err(err);
            }

            state.next_id += 1;
            state.names.insert(name.to_string(), id);
            state.collections.insert(id, collection);

            tracing::info!(collection = name, collection_id = %id, ts, "Created collection");
            Ok(id)
        })
    }

    /// Removes a collection and all of its partitions.
    pub fn drop_collection(&self, ts: Timestamp, name: &str) -> CoreResult<()> {
        self.gated("drop_collection", ts, |state| {
            let id = state.by_name(name)?.id;
            self.meta.remove(&collection_key(id))?;

            state.names.remove(name);
            state.collections.remove(&id);

            tracing::info!(collection = name, collection_id = %id, ts, "Dropped collection");
            Ok(())
        })
    }

    pub fn has_collection(&self, ts: Timestamp, name: &str) -> CoreResult<bool> {
        self.gated("has_collection", ts, |state| Ok(state.names.contains_key(name)))
    }

    pub fn describe_collection(&self, ts: Timestamp, name: &str) -> CoreResult<CollectionMeta> {
        self.gated("describe_collection", ts, |state| state.by_name(name).cloned())
    }

    /// Names of all collections, sorted.
    pub fn show_collections(&self, ts: Timestamp) -> CoreResult<Vec<String>> {
        self.gated("show_collections", ts, |state| {
            let mut names: Vec<String> = state.names.keys().cloned().collect();
            names.sort();
            Ok(names)
        })
    }

    /// Adds partition `tag` to a collection.
    ///
    /// # Errors
    ///
    /// `NotFound` if the collection is absent, `AlreadyExists` if the tag is present,
    /// `InvalidArgument` for an empty tag or when the partition limit is reached.
    pub fn create_partition(
        &self,
        ts: Timestamp,
        collection_name: &str,
        tag: &str,
    ) -> CoreResult<()> {
        self.gated("create_partition", ts, |state| {
            if tag.is_empty() {
                return Err(CoreError::invalid_argument("partition tag is empty"));
            }

            let current = state.by_name(collection_name)?;
            if current.has_partition(tag) {
                return Err(CoreError::already_exists(
                    "partition",
                    format!("{collection_name}/{tag}"),
                ));
            }
            if current.partitions.len() >= self.config.max_partition_num {
                return Err(CoreError::invalid_argument(format!(
                    "collection `{}` already has the maximum of {} partitions",
                    collection_name, self.config.max_partition_num
                )));
            }

            let mut updated = current.clone();
            updated.partitions.push(PartitionMeta {
                tag: tag.to_string(),
                create_time: ts,
            });
            self.persist(&updated)?;
            state.collections.insert(updated.id, updated);

            tracing::info!(
                collection = collection_name,
                partition = tag,
                ts,
                "Created partition"
            );
            Ok(())
        })
    }

    /// Removes partition `tag`. The default partition cannot be dropped.
    pub fn drop_partition(
        &self,
        ts: Timestamp,
        collection_name: &str,
        tag: &str,
    ) -> CoreResult<()> {
        self.gated("drop_partition", ts, |state| {
            let current = state.by_name(collection_name)?;
            if tag == self.config.default_partition_tag {
                return Err(CoreError::invalid_argument(format!(
                    "default partition `{tag}` cannot be dropped"
                )));
            }
            if !current.has_partition(tag) {
                return Err(CoreError::not_found(
                    "partition",
                    format!("{collection_name}/{tag}"),
                ));
            }

            let mut updated = current.clone();
            updated.partitions.retain(|p| p.tag != tag);
            self.persist(&updated)?;
            state.collections.insert(updated.id, updated);

            tracing::info!(
                collection = collection_name,
                partition = tag,
                ts,
                "Dropped partition"
            );
            Ok(())
        })
    }

    /// Reports whether the collection holds `tag`; `NotFound` if the collection is absent.
    pub fn has_partition(
        &self,
        ts: Timestamp,
        collection_name: &str,
        tag: &str,
    ) -> CoreResult<bool> {
        self.gated("has_partition", ts, |state| {
            Ok(state.by_name(collection_name)?.has_partition(tag))
        })
    }

    /// Partition tags of a collection in creation order.
    pub fn show_partitions(
        &self,
        ts: Timestamp,
        collection_name: &str,
    ) -> CoreResult<Vec<String>> {
        self.gated("show_partitions", ts, |state| {
            Ok(state.by_name(collection_name)?.partition_tags())
        })
    }

    pub fn describe_partition(
        &self,
        ts: Timestamp,
        collection_name: &str,
        tag: &str,
    ) -> CoreResult<PartitionInfo> {
        self.gated("describe_partition", ts, |state| {
            let partition = state
                .by_name(collection_name)?
                .partition(tag)
                .ok_or_else(|| {
                    CoreError::not_found("partition", format!("{collection_name}/{tag}"))
                })?;
            Ok(PartitionInfo {
                collection_name: collection_name.to_string(),
                tag: partition.tag.clone(),
                create_time: partition.create_time,
            })
        })
    }

    /// Snapshot read that bypasses the barrier; for internal and admin callers.
    pub fn get_collection_by_name(&self, name: &str) -> CoreResult<CollectionMeta> {
        self.state.read().by_name(name).cloned()
    }

    /// Snapshot read that bypasses the barrier.
    pub fn get_collection_by_id(&self, id: CollectionId) -> CoreResult<CollectionMeta> {
        self.state
            .read()
            .collections
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("collection", id))
    }

    #[must_use]
    pub fn collection_count(&self) -> usize {
        self.state.read().collections.len()
    }
}
