//! Object metadata blobs
//!
//! The blob stored under an object's node key is a bincode-encoded
//! attribute map. The reserved `omapvals` attribute carries the typed
//! listing entry used by directory listings.

use bytes::Bytes;
use objdir_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Attribute holding the encoded [`ObjectEntry`]
pub const ENTRY_ATTR: &str = "omapvals";

/// Category of a listed object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectCategory {
    #[default]
    None,
    /// Regular object data
    Main,
    /// Internal shadow copy
    Shadow,
    /// In-progress multipart upload metadata
    MultiMeta,
}

/// Listing metadata of an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntryMeta {
    pub category: ObjectCategory,
    pub size: u64,
    pub mtime: SystemTime,
    pub etag: String,
    pub storage_class: String,
    pub owner: String,
    pub owner_display_name: String,
    pub content_type: String,
    pub accounted_size: u64,
    pub user_data: String,
    pub appendable: bool,
}

impl Default for ObjectEntryMeta {
    fn default() -> Self {
        Self {
            category: ObjectCategory::default(),
            size: 0,
            mtime: UNIX_EPOCH,
            etag: String::new(),
            storage_class: String::new(),
            owner: String::new(),
            owner_display_name: String::new(),
            content_type: String::new(),
            accounted_size: 0,
            user_data: String::new(),
            appendable: false,
        }
    }
}

/// Listing entry for one object version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub name: String,
    pub instance: String,
    pub pool: i64,
    pub epoch: u64,
    pub locator: String,
    pub exists: bool,
    pub meta: ObjectEntryMeta,
    pub tag: String,
    pub flags: u16,
}

impl ObjectEntry {
    /// Entry for a current, existing object
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            exists: true,
            meta: ObjectEntryMeta {
                category: ObjectCategory::Main,
                size,
                accounted_size: size,
                mtime: SystemTime::now(),
                ..ObjectEntryMeta::default()
            },
            ..Self::default()
        }
    }
}

/// Named attribute map, the unit stored per object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAttrs {
    attrs: BTreeMap<String, Bytes>,
}

impl ObjectAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Bytes>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Bytes> {
        self.attrs.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Bytes> {
        self.attrs.remove(name)
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bytes)> {
        self.attrs.iter()
    }

    pub fn into_inner(self) -> BTreeMap<String, Bytes> {
        self.attrs
    }

    /// Encode to the stored blob format
    pub fn encode(&self) -> Result<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode a stored blob
    pub fn decode(blob: &[u8]) -> Result<Self> {
        bincode::deserialize(blob).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Store the listing entry under [`ENTRY_ATTR`]
    pub fn set_entry(&mut self, entry: &ObjectEntry) -> Result<()> {
        let encoded =
            bincode::serialize(entry).map_err(|e| Error::Serialization(e.to_string()))?;
        self.insert(ENTRY_ATTR, encoded);
        Ok(())
    }

    /// Decode the listing entry, if present
    pub fn entry(&self) -> Result<Option<ObjectEntry>> {
        self.attrs
            .get(ENTRY_ATTR)
            .map(|raw| {
                bincode::deserialize(raw).map_err(|e| Error::Deserialization(e.to_string()))
            })
            .transpose()
    }
}

impl From<BTreeMap<String, Bytes>> for ObjectAttrs {
    fn from(attrs: BTreeMap<String, Bytes>) -> Self {
        Self { attrs }
    }
}

impl FromIterator<(String, Bytes)> for ObjectAttrs {
    fn from_iter<I: IntoIterator<Item = (String, Bytes)>>(iter: I) -> Self {
        Self {
            attrs: iter.into_iter().collect(),
        }
    }
}
