//! Index declarations and the key signatures used to compare them against live indexes.
//!
//! A desired index is declared as an [`IndexSpec`]: an ordered list of keys, each with a
//! direction or the full-text marker, plus [`IndexOptions`]. Live indexes are read back
//! from the store as [`ExistingIndex`] values in the store's own layout. Both sides reduce
//! to a [`KeySignature`], which is what the reconciler compares.
//!
//! # Example
//!
//! ```ignore
//! use docstate::index::IndexSpec;
//!
//! let by_code = IndexSpec::builder()
//!     .ascending("code")
//!     .unique(true)
//!     .build()?;
//!
//! let search = IndexSpec::builder()
//!     .text("title")
//!     .text("body")
//!     .build()?;
//! ```

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{DataError, DataResult};

/// Name of the primary-key index every collection carries. It is never dropped.
pub const PRIMARY_KEY_INDEX: &str = "_id_";

/// Key under which the store records a full-text index in the key document.
pub const TEXT_MARKER_FIELD: &str = "_fts";

/// Companion key the store adds next to [`TEXT_MARKER_FIELD`].
pub const TEXT_INDEX_FIELD: &str = "_ftsx";

/// How a single field participates in an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IndexKind {
    Ascending,
    Descending,
    /// Full-text key. All text keys of a spec form one composite text index.
    Text,
}

impl IndexKind {
    /// The value the store uses for this kind in a key document.
    pub fn to_bson(self) -> Bson {
        match self {
            IndexKind::Ascending => Bson::Int32(1),
            IndexKind::Descending => Bson::Int32(-1),
            IndexKind::Text => Bson::String("text".to_string()),
        }
    }

    /// Parses a key-document value. Stores may report directions as any numeric type.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        let direction = match value {
            Bson::Int32(v) => *v as f64,
            Bson::Int64(v) => *v as f64,
            Bson::Double(v) => *v,
            Bson::String(s) if s == "text" => return Some(IndexKind::Text),
            _ => return None,
        };

        if direction == 1.0 {
            Some(IndexKind::Ascending)
        } else if direction == -1.0 {
            Some(IndexKind::Descending)
        } else {
            None
        }
    }

    fn name_suffix(self) -> &'static str {
        match self {
            IndexKind::Ascending => "1",
            IndexKind::Descending => "-1",
            IndexKind::Text => "text",
        }
    }
}

/// A single `(field, kind)` pair of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexKey {
    pub field: String,
    pub kind: IndexKind,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, kind: IndexKind) -> Self {
        Self { field: field.into(), kind }
    }
}

/// Option flags of an index. Changing them requires dropping and recreating the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
}

/// A desired index, declared once at configuration time.
///
/// Deserialization goes through [`IndexSpec::new`], so declarations read from configuration
/// are validated like built ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIndexSpec")]
pub struct IndexSpec {
    keys: Vec<IndexKey>,
    options: IndexOptions,
}

#[derive(Deserialize)]
struct RawIndexSpec {
    keys: Vec<IndexKey>,
    #[serde(default)]
    options: IndexOptions,
}

impl TryFrom<RawIndexSpec> for IndexSpec {
    type Error = DataError;

    fn try_from(raw: RawIndexSpec) -> DataResult<Self> {
        IndexSpec::new(raw.keys, raw.options)
    }
}

impl IndexSpec {
    /// Creates a spec, rejecting empty key lists and repeated field names.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidIndex`] when the keys are malformed.
    pub fn new(keys: Vec<IndexKey>, options: IndexOptions) -> DataResult<Self> {
        if keys.is_empty() {
            return Err(DataError::InvalidIndex("index has no keys".to_string()));
        }

        let mut seen = BTreeSet::new();
        for key in &keys {
            if key.field.is_empty() {
                return Err(DataError::InvalidIndex("empty field name".to_string()));
            }
            if !seen.insert(key.field.as_str()) {
                return Err(DataError::InvalidIndex(format!(
                    "field '{}' appears more than once",
                    key.field
                )));
            }
        }

        Ok(Self { keys, options })
    }

    /// Single-field ascending index with default options.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey::new(field, IndexKind::Ascending)],
            options: IndexOptions::default(),
        }
    }

    /// Single-field descending index with default options.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey::new(field, IndexKind::Descending)],
            options: IndexOptions::default(),
        }
    }

    /// Single-field full-text index with default options.
    pub fn text(field: impl Into<String>) -> Self {
        Self {
            keys: vec![IndexKey::new(field, IndexKind::Text)],
            options: IndexOptions::default(),
        }
    }

    pub fn builder() -> IndexSpecBuilder {
        IndexSpecBuilder::new()
    }

    /// Returns a copy of this spec with the given options.
    pub fn with_options(mut self, options: IndexOptions) -> Self {
        self.options = options;
        self
    }

    pub fn keys(&self) -> &[IndexKey] {
        &self.keys
    }

    pub fn options(&self) -> IndexOptions {
        self.options
    }

    /// Whether any key is a full-text key.
    pub fn is_text(&self) -> bool {
        self.keys
            .iter()
            .any(|key| key.kind == IndexKind::Text)
    }

    /// Fields contributing to the full-text part of this index.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .filter(|key| key.kind == IndexKind::Text)
            .map(|key| key.field.as_str())
    }

    /// The key document handed to the store, in declaration order.
    pub fn key_document(&self) -> Document {
        self.keys
            .iter()
            .map(|key| (key.field.clone(), key.kind.to_bson()))
            .collect()
    }

    /// The name the store assigns when none is given, e.g. `code_1_created_-1`.
    pub fn default_name(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.kind.name_suffix()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn signature(&self) -> KeySignature {
        let mut signature = KeySignature::default();

        for key in &self.keys {
            match key.kind {
                IndexKind::Text => {
                    signature
                        .text
                        .insert(key.field.clone());
                }
                kind => {
                    signature
                        .directional
                        .insert(key.field.clone(), kind);
                }
            }
        }

        signature
    }
}

/// Fluent builder for [`IndexSpec`].
#[derive(Debug, Default)]
pub struct IndexSpecBuilder {
    keys: Vec<IndexKey>,
    options: IndexOptions,
}

impl IndexSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(mut self, field: impl Into<String>, kind: IndexKind) -> Self {
        self.keys.push(IndexKey::new(field, kind));
        self
    }

    pub fn ascending(self, field: impl Into<String>) -> Self {
        self.key(field, IndexKind::Ascending)
    }

    pub fn descending(self, field: impl Into<String>) -> Self {
        self.key(field, IndexKind::Descending)
    }

    pub fn text(self, field: impl Into<String>) -> Self {
        self.key(field, IndexKind::Text)
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.options.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.options.sparse = sparse;
        self
    }

    /// # Errors
    ///
    /// Returns [`DataError::InvalidIndex`] when no keys were added or a field repeats.
    pub fn build(self) -> DataResult<IndexSpec> {
        IndexSpec::new(self.keys, self.options)
    }
}

/// The comparable shape of an index's keys.
///
/// Directional keys are compared as a field to direction map, so declaration order does
/// not matter. Text keys are compared as a set of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySignature {
    pub directional: BTreeMap<String, IndexKind>,
    pub text: BTreeSet<String>,
    /// Keys of kinds this layer cannot declare (hashed, geo, ...). A signature carrying any
    /// of these never matches a desired spec.
    pub unsupported: BTreeMap<String, String>,
}

impl KeySignature {
    pub fn len(&self) -> usize {
        self.directional.len() + self.text.len() + self.unsupported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An index as currently stored, read fresh on every reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    /// Key document exactly as the store reports it.
    pub keys: Document,
    /// Per-field weights of a full-text index.
    pub weights: Option<Document>,
    pub unique: bool,
    pub sparse: bool,
}

impl ExistingIndex {
    /// Describes the index the store would hold after creating `spec`.
    ///
    /// Full-text keys collapse into the `_fts`/`_ftsx` marker pair at the position of the
    /// first text key, with every text field given weight 1.
    pub fn from_spec(name: impl Into<String>, spec: &IndexSpec) -> Self {
        let mut keys = Document::new();
        let mut weights = Document::new();

        for key in spec.keys() {
            match key.kind {
                IndexKind::Text => {
                    if !keys.contains_key(TEXT_MARKER_FIELD) {
                        keys.insert(TEXT_MARKER_FIELD, "text");
                        keys.insert(TEXT_INDEX_FIELD, 1);
                    }
                    weights.insert(key.field.clone(), 1);
                }
                kind => {
                    keys.insert(key.field.clone(), kind.to_bson());
                }
            }
        }

        Self {
            name: name.into(),
            keys,
            weights: (!weights.is_empty()).then_some(weights),
            unique: spec.options().unique,
            sparse: spec.options().sparse,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.name == PRIMARY_KEY_INDEX
    }

    pub fn is_text(&self) -> bool {
        self.keys.contains_key(TEXT_MARKER_FIELD)
    }

    /// Reconstructs the key signature, recovering text fields from the weight map.
    pub fn signature(&self) -> KeySignature {
        let mut signature = KeySignature::default();

        for (field, value) in &self.keys {
            match field.as_str() {
                TEXT_INDEX_FIELD => continue,
                TEXT_MARKER_FIELD => {
                    if let Some(weights) = &self.weights {
                        signature
                            .text
                            .extend(weights.keys().cloned());
                    }
                }
                _ => match IndexKind::from_bson(value) {
                    Some(IndexKind::Text) => {
                        signature
                            .text
                            .insert(field.clone());
                    }
                    Some(kind) => {
                        signature
                            .directional
                            .insert(field.clone(), kind);
                    }
                    None => {
                        signature
                            .unsupported
                            .insert(field.clone(), value.to_string());
                    }
                },
            }
        }

        signature
    }

    /// Exact key-signature match against a desired spec.
    pub fn matches_keys(&self, spec: &IndexSpec) -> bool {
        self.signature() == spec.signature()
    }

    /// Whether `unique` and `sparse` agree with the desired spec.
    pub fn matches_options(&self, spec: &IndexSpec) -> bool {
        let options = spec.options();
        self.unique == options.unique && self.sparse == options.sparse
    }
}
