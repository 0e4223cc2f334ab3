use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Index parameter key carrying the similarity metric of a vector field.
pub const METRIC_TYPE_KEY: &str = "metric_type";

/// Similarity metric used when indexing a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    /// Euclidean distance.
    L2,
    /// Inner product.
    #[serde(rename = "IP")]
    InnerProduct,
    /// Jaccard distance over binary vectors.
    Jaccard,
    /// Tanimoto distance over binary vectors.
    Tanimoto,
    /// Hamming distance over binary vectors.
    Hamming,
    /// Substructure match over binary vectors.
    Substructure,
    /// Superstructure match over binary vectors.
    Superstructure,
}

impl MetricType {
    /// Returns the canonical metric name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::InnerProduct => "IP",
            Self::Jaccard => "JACCARD",
            Self::Tanimoto => "TANIMOTO",
            Self::Hamming => "HAMMING",
            Self::Substructure => "SUBSTRUCTURE",
            Self::Superstructure => "SUPERSTRUCTURE",
        }
    }

    /// True for metrics defined over binary vectors.
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        !matches!(self, Self::L2 | Self::InnerProduct)
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = CoreError;

    /// Parses a metric name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l2" => Ok(Self::L2),
            "ip" => Ok(Self::InnerProduct),
            "jaccard" => Ok(Self::Jaccard),
            "tanimoto" => Ok(Self::Tanimoto),
            "hamming" => Ok(Self::Hamming),
            "substructure" => Ok(Self::Substructure),
            "superstructure" => Ok(Self::Superstructure),
            _ => Err(CoreError::invalid_argument(format!(
                "metric type not found: ({s})"
            ))),
        }
    }
}

/// Element type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    VectorBinary,
    VectorFloat,
}

impl DataType {
    #[must_use]
    pub const fn is_vector(&self) -> bool {
        matches!(self, Self::VectorBinary | Self::VectorFloat)
    }
}

/// Free-form type or index parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

impl KeyValuePair {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Definition of a single collection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_type: DataType,
    #[serde(default)]
    pub type_params: Vec<KeyValuePair>,
    #[serde(default)]
    pub index_params: Vec<KeyValuePair>,
}

impl FieldSchema {
    /// Creates a field without parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data_type,
            type_params: Vec::new(),
            index_params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_type_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.type_params.push(KeyValuePair::new(key, value));
        self
    }

    #[must_use]
    pub fn with_index_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.index_params.push(KeyValuePair::new(key, value));
        self
    }

    /// Returns the declared metric, if the field carries one.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when the `metric_type` parameter is not a known metric.
    pub fn metric_type(&self) -> CoreResult<Option<MetricType>> {
        self.index_params
            .iter()
            .find(|kv| kv.key == METRIC_TYPE_KEY)
            .map(|kv| kv.value.parse())
            .transpose()
    }

    /// A metric applies only to a vector field of the matching kind.
    fn check_metric(&self, metric: MetricType) -> CoreResult<()> {
        let binary_field = self.data_type == DataType::VectorBinary;
        if self.data_type.is_vector() && metric.is_binary() == binary_field {
            return Ok(());
        }
        Err(CoreError::invalid_argument(format!(
            "metric type {metric} does not apply to field `{}` of type {:?}",
            self.name, self.data_type
        )))
    }
}

/// Ordered field list describing a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CollectionSchema {
    /// Optional; when set it must equal the collection name it is registered under.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub auto_id: bool,
    pub fields: Vec<FieldSchema>,
}

impl CollectionSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            auto_id: false,
            fields,
        }
    }

    /// Validates the schema for registration under `collection_name`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the schema is malformed.
    pub fn validate(&self, collection_name: &str) -> CoreResult<()> {
        if !self.name.is_empty() && self.name != collection_name {
            return Err(CoreError::invalid_argument(format!(
                "schema name `{}` does not match collection `{}`",
                self.name, collection_name
            )));
        }

        if self.fields.is_empty() {
            return Err(CoreError::invalid_argument(format!(
                "collection `{collection_name}` has no fields"
            )));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(CoreError::invalid_argument(format!(
                    "collection `{collection_name}` has a field without a name"
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::invalid_argument(format!(
                    "duplicate field `{}` in collection `{}`",
                    field.name, collection_name
                )));
            }
            if let Some(metric) = field.metric_type()? {
                field.check_metric(metric)?;
            }
        }

        Ok(())
    }

}
