//! Configuration management for VexDB
//!
//! Two layers live here:
//! - [`VexConfig`]: typed settings for the master and data node, loaded from YAML
//!   files with environment variable overrides and validated on load.
//! - [`ParamTable`]: the bootstrap parameter table, a flat string table seeded from
//!   YAML and read through typed accessors.

use config::{Config, ConfigError, Environment, File, FileFormat, Source, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::collection::DEFAULT_PARTITION_TAG;
use crate::error::{CoreError, CoreResult};
use crate::kv::MemoryKv;
use crate::traits::KvBase;

/// Root configuration structure for VexDB
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VexConfig {
    #[serde(default)]
    pub master: MasterConfig,

    #[serde(default)]
    pub datanode: DataNodeConfig,
}

impl VexConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by VEXDB_CONFIG env var
    /// 3. ./config/vexdb.yaml
    /// 4. /etc/vexdb/vexdb.yaml
    /// 5. Hardcoded defaults (lowest priority)
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        if let Ok(config_path) = std::env::var("VEXDB_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder
            .add_source(File::with_name("./config/vexdb").required(false))
            .add_source(File::with_name("/etc/vexdb/vexdb").required(false));

        // Example: VEXDB__MASTER__MAX_PARTITION_NUM=128
        builder = builder.add_source(
            Environment::with_prefix("VEXDB")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: VexConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            // Master: catalog
            .set_default("master.meta_root_path", "/vexdb/meta")?
            .set_default("master.kv_root_path", "/vexdb/kv")?
            .set_default("master.default_partition_tag", DEFAULT_PARTITION_TAG)?
            .set_default("master.max_partition_num", 4096)?
            // Data node: statistics reporting
            .set_default("datanode.stats_report_interval_ms", 1000)?
            .set_default("datanode.stats_channel_capacity", 1024)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.master.validate()?;
        self.datanode.validate()
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: VexConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Catalog settings for the master
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    /// Key-space root for catalog metadata
    pub meta_root_path: String,

    /// Key-space root for generic key/value data
    pub kv_root_path: String,

    /// Tag of the partition created with every collection
    pub default_partition_tag: String,

    /// Upper bound on partitions per collection, default included
    pub max_partition_num: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            meta_root_path: "/vexdb/meta".to_string(),
            kv_root_path: "/vexdb/kv".to_string(),
            default_partition_tag: DEFAULT_PARTITION_TAG.to_string(),
            max_partition_num: 4096,
        }
    }
}

impl MasterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_partition_tag.is_empty() {
            return Err(ConfigError::Message(
                "master.default_partition_tag must not be empty".to_string(),
            ));
        }

        if self.max_partition_num == 0 {
            return Err(ConfigError::Message(
                "master.max_partition_num must be > 0".to_string(),
            ));
        }

        let meta = self.meta_root_path.trim_end_matches('/');
        let kv = self.kv_root_path.trim_end_matches('/');
        let nested = |outer: &str, inner: &str| inner.starts_with(&format!("{outer}/"));
        if meta == kv || nested(meta, kv) || nested(kv, meta) {
            return Err(ConfigError::Message(
                "master.meta_root_path and master.kv_root_path must be disjoint".to_string(),
            ));
        }

        Ok(())
    }
}

/// Data node settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataNodeConfig {
    /// Milliseconds between segment statistics reports
    pub stats_report_interval_ms: u64,

    /// Buffered report batches before the reporter waits on the sink
    pub stats_channel_capacity: usize,
}

impl Default for DataNodeConfig {
    fn default() -> Self {
        Self {
            stats_report_interval_ms: 1000,
            stats_channel_capacity: 1024,
        }
    }
}

impl DataNodeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stats_report_interval_ms == 0 {
            return Err(ConfigError::Message(
                "datanode.stats_report_interval_ms must be > 0".to_string(),
            ));
        }

        if self.stats_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "datanode.stats_channel_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert report interval to Duration
    pub fn stats_report_interval(&self) -> Duration {
        Duration::from_millis(self.stats_report_interval_ms)
    }
}

/// Flat parameter table used at bootstrap.
///
/// Nested YAML documents are flattened into dotted keys (`etcd.address`), sequence
/// items are addressed by index (`channels.0`).
#[derive(Clone)]
pub struct ParamTable {
    kv: Arc<dyn KvBase>,
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamTable {
    /// Creates an empty table backed by a [`MemoryKv`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_kv(Arc::new(MemoryKv::new()))
    }

    #[must_use]
    pub fn with_kv(kv: Arc<dyn KvBase>) -> Self {
        Self { kv }
    }

    pub fn save(&self, key: &str, value: &str) -> CoreResult<()> {
        self.kv.save(key, value)
    }

    pub fn load(&self, key: &str) -> CoreResult<String> {
        self.kv.load(key)
    }

    pub fn remove(&self, key: &str) -> CoreResult<()> {
        self.kv.remove(key)
    }

    pub fn load_range(
        &self,
        low: &str,
        high: &str,
        limit: usize,
    ) -> CoreResult<(Vec<String>, Vec<String>)> {
        self.kv.load_range(low, high, limit)
    }

    /// Seeds the table from a YAML file, overwriting keys that already exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the file is missing or not valid YAML.
    pub fn load_yaml(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        let document = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()?
            .collect()?;

        let mut pairs = Vec::new();
        for (key, value) in document {
            flatten(key, value, &mut pairs)?;
        }

        tracing::debug!(path = %path.display(), params = pairs.len(), "loaded parameter file");
        self.kv.multi_save(&pairs)
    }

    /// Reads an integer parameter.
    pub fn parse_int(&self, key: &str) -> CoreResult<i64> {
        let raw = self.load(key)?;
        raw.trim().parse().map_err(|_| {
            CoreError::invalid_argument(format!("parameter `{key}` is not an integer: {raw}"))
        })
    }

    /// Reads a floating-point parameter.
    pub fn parse_float(&self, key: &str) -> CoreResult<f64> {
        let raw = self.load(key)?;
        raw.trim().parse().map_err(|_| {
            CoreError::invalid_argument(format!("parameter `{key}` is not a number: {raw}"))
        })
    }

    /// Reads a boolean parameter.
    pub fn parse_bool(&self, key: &str) -> CoreResult<bool> {
        let raw = self.load(key)?;
        raw.trim().parse().map_err(|_| {
            CoreError::invalid_argument(format!("parameter `{key}` is not a boolean: {raw}"))
        })
    }

    /// Reads a parameter, falling back to `default` when it is absent.
    pub fn load_with_default(&self, key: &str, default: &str) -> CoreResult<String> {
        match self.load(key) {
            Err(CoreError::NotFound { .. }) => Ok(default.to_string()),
            other => other,
        }
    }
}

fn flatten(key: String, value: Value, out: &mut Vec<(String, String)>) -> CoreResult<()> {
    match value.kind {
        ValueKind::Table(table) => {
            for (child, value) in table {
                flatten(format!("{key}.{child}"), value, out)?;
            }
        }
        ValueKind::Array(items) => {
            for (index, value) in items.into_iter().enumerate() {
                flatten(format!("{key}.{index}"), value, out)?;
            }
        }
        ValueKind::Nil => out.push((key, String::new())),
        scalar => out.push((key, Value::from(scalar).into_string()?)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_configuration() {
        let config = VexConfig::default();

        assert_eq!(config.master.meta_root_path, "/vexdb/meta");
        assert_eq!(config.master.kv_root_path, "/vexdb/kv");
        assert_eq!(config.master.default_partition_tag, "_default");
        assert_eq!(config.master.max_partition_num, 4096);

        assert_eq!(config.datanode.stats_report_interval().as_millis(), 1000);
        assert_eq!(config.datanode.stats_channel_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = VexConfig::default();

        config.master.max_partition_num = 0;
        assert!(config.validate().is_err());
        config.master.max_partition_num = 16;

        config.master.kv_root_path = "/vexdb/meta/kv".to_string();
        assert!(config.validate().is_err());
        config.master.kv_root_path = "/vexdb/meta/".to_string();
        assert!(config.validate().is_err());
        config.master.kv_root_path = "/vexdb/kv".to_string();

        config.datanode.stats_report_interval_ms = 0;
        assert!(config.validate().is_err());
        config.datanode.stats_report_interval_ms = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "master:\n  max_partition_num: 8\n  meta_root_path: /test/root/meta"
        )
        .unwrap();

        let config = VexConfig::from_file(file.path()).unwrap();
        assert_eq!(config.master.max_partition_num, 8);
        assert_eq!(config.master.meta_root_path, "/test/root/meta");
        assert_eq!(config.master.kv_root_path, "/vexdb/kv");
        assert_eq!(config.datanode.stats_channel_capacity, 1024);
    }

    #[test]
    fn test_param_table_save_load_remove() {
        let params = ParamTable::new();
        params.save("int", "10").unwrap();
        params.save("float", "1.234").unwrap();
        params.save("flag", "true").unwrap();

        assert_eq!(params.load("int").unwrap(), "10");
        assert_eq!(params.parse_int("int").unwrap(), 10);
        assert!((params.parse_float("float").unwrap() - 1.234).abs() < f64::EPSILON);
        assert!(params.parse_bool("flag").unwrap());

        params.remove("int").unwrap();
        assert!(params.load("int").is_err());
        assert_eq!(params.load_with_default("int", "7").unwrap(), "7");
    }

    #[test]
    fn test_param_table_parse_errors() {
        let params = ParamTable::new();
        params.save("ParseIntWithErrInvalidInt", "invalid").unwrap();
        let err = params.parse_int("ParseIntWithErrInvalidInt").unwrap_err();
        assert_eq!(err.kind(), "invalid_argument");
        assert_eq!(params.parse_int("missing").unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_param_table_load_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "etcd:\n  address: localhost\n  port: 2379\n\
             pulsar:\n  port: 6650\n\
             channels:\n  - dm0\n  - dm1\n"
        )
        .unwrap();

        let params = ParamTable::new();
        params.load_yaml(file.path()).unwrap();

        assert_eq!(params.load("etcd.address").unwrap(), "localhost");
        assert_eq!(params.parse_int("etcd.port").unwrap(), 2379);
        assert_eq!(params.parse_int("pulsar.port").unwrap(), 6650);
        assert_eq!(params.load("channels.1").unwrap(), "dm1");

        let (keys, _) = params.load_range("etcd.", "etcd/", 0).unwrap();
        assert_eq!(keys, vec!["etcd.address", "etcd.port"]);
    }

    #[test]
    fn test_param_table_missing_yaml() {
        let params = ParamTable::new();
        assert!(params.load_yaml("/nonexistent/vexdb.yaml").is_err());
    }
}
