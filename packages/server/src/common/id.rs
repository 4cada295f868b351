//! Typed v7 UUIDs.
//!
//! `Id<T>` tags a `Uuid` with the entity it identifies, so a run id cannot be
//! passed where a novel id is expected:
//!
//! ```rust
//! use ingest_core::common::id::Id;
//!
//! pub struct Novel;
//! pub struct ImportRun;
//!
//! let novel_id: Id<Novel> = Id::new();
//! let run_id: Id<ImportRun> = Id::new();
//! assert_ne!(novel_id.to_string(), run_id.to_string());
//! ```
//!
//! New ids are time-ordered, which keeps primary-key inserts append-only and
//! lets `ORDER BY id` follow creation order.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::{PgArgumentBuffer, PgTypeInfo, PgValueRef, Postgres};
use sqlx::{Decode, Encode, Type};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use uuid::Uuid;

/// ```compile_fail
/// use ingest_core::common::{ImportRunId, NovelId};
///
/// let novel_id: NovelId = ImportRunId::new();
/// ```
#[repr(transparent)]
pub struct Id<T>(Uuid, PhantomData<fn() -> T>);

impl<T> Id<T> {
    pub fn new() -> Self {
        Self(Uuid::now_v7(), PhantomData)
    }

    /// Accepts any UUID text form, as typed on the command line.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self::wrap)
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Last `n` hex digits of the dashless form. For v7 ids these come from
    /// the random bits, so ids minted in the same millisecond differ.
    pub fn short_hex(&self, n: usize) -> String {
        let simple = self.0.simple().to_string();
        simple[simple.len() - n.min(simple.len())..].to_string()
    }

    fn wrap(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }
}

impl<T> Default for Id<T> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: derives would put bounds on the marker type.

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entity = std::any::type_name::<T>().rsplit("::").next().unwrap_or("?");
        write!(f, "{entity}Id({})", self.0)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(Self::wrap)
    }
}

// Stored as plain `uuid` columns.

impl<T> Type<Postgres> for Id<T> {
    fn type_info() -> PgTypeInfo {
        <Uuid as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        <Uuid as Type<Postgres>>::compatible(ty)
    }
}

impl<T> Encode<'_, Postgres> for Id<T> {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        <Uuid as Encode<Postgres>>::encode_by_ref(&self.0, buf)
    }
}

impl<T> Decode<'_, Postgres> for Id<T> {
    fn decode(value: PgValueRef<'_>) -> Result<Self, BoxDynError> {
        <Uuid as Decode<Postgres>>::decode(value).map(Self::wrap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Novel;

    type NovelId = Id<Novel>;

    const SAMPLE: &str = "0191e3a4-5b6c-7d8e-9f00-112233445566";

    #[test]
    fn test_new_ids_are_time_ordered() {
        let first = NovelId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = NovelId::new();
        assert!(first < second);
    }

    #[test]
    fn test_parse_accepts_display_form() {
        let id = NovelId::parse(SAMPLE).unwrap();
        assert_eq!(id.to_string(), SAMPLE);
        assert!(NovelId::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_json_is_a_bare_uuid_string() {
        let id = NovelId::parse(SAMPLE).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{SAMPLE}\""));
        assert_eq!(serde_json::from_str::<NovelId>(&json).unwrap(), id);
    }

    #[test]
    fn test_nil_detection() {
        assert!(NovelId::parse("00000000-0000-0000-0000-000000000000").unwrap().is_nil());
        assert!(!NovelId::new().is_nil());
    }

    #[test]
    fn test_short_hex_uses_random_tail() {
        let id = NovelId::parse(SAMPLE).unwrap();
        assert_eq!(id.short_hex(8), "33445566");
        assert_eq!(id.short_hex(64).len(), 32);
    }

    #[test]
    fn test_debug_names_entity() {
        let id = NovelId::parse(SAMPLE).unwrap();
        assert_eq!(format!("{id:?}"), format!("NovelId({SAMPLE})"));
    }
}
