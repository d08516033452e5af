//! Core traits for records managed by the data layer.
//!
//! A record is a serde-serializable value with a stable [`Uuid`] identity that lives in a
//! single collection. The identity is what the cache layer keys its entries by.

use bson::{Bson, Uuid, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Deserialize, Serialize};

use crate::error::DataResult;

/// Trait that every record stored through a record manager must implement.
///
/// # Example
///
/// ```ignore
/// use docstate::record::Record;
/// use bson::Uuid;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Country {
///     pub id: Uuid,
///     pub code: String,
/// }
///
/// impl Record for Country {
///     fn id(&self) -> &Uuid {
///         &self.id
///     }
///
///     fn collection_name() -> &'static str {
///         "countries"
///     }
/// }
/// ```
pub trait Record: Serialize + for<'de> Deserialize<'de> + Send + Sync + Clone + 'static {
    /// Returns a reference to this record's identity.
    fn id(&self) -> &Uuid;

    /// Returns the name of the collection this record belongs to.
    fn collection_name() -> &'static str;
}

/// BSON conversion helpers, implemented for every [`Record`].
pub trait RecordExt: Record {
    /// Converts this record to a BSON value for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_bson(&self) -> DataResult<Bson>;

    /// Creates a record from a BSON value read from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson(bson: Bson) -> DataResult<Self>;
}

impl<R: Record> RecordExt for R {
    fn to_bson(&self) -> DataResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }

    fn from_bson(bson: Bson) -> DataResult<Self> {
        Ok(deserialize_from_bson(bson)?)
    }
}
