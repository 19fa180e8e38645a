//! Chunk attributes and the protocol headers they map to.
//!
//! Attributes are persisted by the storage backend next to the chunk bytes.
//! All keys share the `user.silo.` namespace so they never collide with
//! attributes written by anything else. [`ATTR_MAP`] declares which of them
//! are visible at the protocol boundary, and in which order they are echoed.

use std::collections::BTreeMap;

/// Namespace prefix shared by every chunk attribute.
pub const ATTR_PREFIX: &str = "user.silo.";

pub const ATTR_CHECKSUM: &str = "user.silo.chunk.hash";
pub const ATTR_POSITION: &str = "user.silo.chunk.position";
pub const ATTR_SIZE: &str = "user.silo.chunk.size";
pub const ATTR_CHUNK_ID: &str = "user.silo.chunk.id";
pub const ATTR_CHUNK_METHOD: &str = "user.silo.content.chunk_method";
pub const ATTR_MIME_TYPE: &str = "user.silo.content.mime_type";
pub const ATTR_STORAGE_POLICY: &str = "user.silo.content.storage_policy";
pub const ATTR_ALIAS: &str = "user.silo.content";
pub const ATTR_METACHUNK_SIZE: &str = "user.silo.metachunk.size";
pub const ATTR_METACHUNK_HASH: &str = "user.silo.metachunk.hash";
pub const ATTR_COMPRESSION: &str = "user.silo.compression";
pub const ATTR_VERSION: &str = "user.silo.version";

pub const HEADER_ALIAS: &str = "x-silo-alias";
pub const HEADER_STORAGE_POLICY: &str = "x-silo-chunk-meta-content-storage-policy";
pub const HEADER_MIME_TYPE: &str = "x-silo-chunk-meta-content-mime-type";
pub const HEADER_CHUNK_METHOD: &str = "x-silo-chunk-meta-content-chunk-method";
pub const HEADER_CHUNK_ID: &str = "x-silo-chunk-meta-chunk-id";
pub const HEADER_SIZE: &str = "x-silo-chunk-meta-chunk-size";
pub const HEADER_POSITION: &str = "x-silo-chunk-meta-chunk-pos";
pub const HEADER_CHECKSUM: &str = "x-silo-chunk-meta-chunk-hash";
pub const HEADER_METACHUNK_SIZE: &str = "x-silo-chunk-meta-metachunk-size";
pub const HEADER_METACHUNK_HASH: &str = "x-silo-chunk-meta-metachunk-hash";

/// Value of [`ATTR_COMPRESSION`] for zlib-compressed chunks.
pub const COMPRESSION_ZLIB: &str = "zlib";

/// Value written to [`ATTR_VERSION`] by every upload.
pub const FORMAT_VERSION: &str = "1";

/// One (attribute, header) pair of the mapping table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttrMapping {
    /// Storage-level attribute key.
    pub attr: &'static str,
    /// Protocol header name (lowercase).
    pub header: &'static str,
}

/// The attribute/header mapping table.
///
/// Uploads read these headers into attributes; downloads write the
/// attributes back out as headers, in this order.
pub const ATTR_MAP: &[AttrMapping] = &[
    AttrMapping {
        attr: ATTR_ALIAS,
        header: HEADER_ALIAS,
    },
    AttrMapping {
        attr: ATTR_STORAGE_POLICY,
        header: HEADER_STORAGE_POLICY,
    },
    AttrMapping {
        attr: ATTR_MIME_TYPE,
        header: HEADER_MIME_TYPE,
    },
    AttrMapping {
        attr: ATTR_CHUNK_METHOD,
        header: HEADER_CHUNK_METHOD,
    },
    AttrMapping {
        attr: ATTR_CHUNK_ID,
        header: HEADER_CHUNK_ID,
    },
    AttrMapping {
        attr: ATTR_SIZE,
        header: HEADER_SIZE,
    },
    AttrMapping {
        attr: ATTR_POSITION,
        header: HEADER_POSITION,
    },
    AttrMapping {
        attr: ATTR_CHECKSUM,
        header: HEADER_CHECKSUM,
    },
    AttrMapping {
        attr: ATTR_METACHUNK_SIZE,
        header: HEADER_METACHUNK_SIZE,
    },
    AttrMapping {
        attr: ATTR_METACHUNK_HASH,
        header: HEADER_METACHUNK_HASH,
    },
];

/// Attributes an upload must carry before any byte is written.
pub const MANDATORY_ATTRS: &[&str] = &[
    ATTR_STORAGE_POLICY,
    ATTR_CHUNK_METHOD,
    ATTR_SIZE,
    ATTR_POSITION,
];

/// Look up the header name mapped to an attribute.
pub fn header_for_attr(attr: &str) -> Option<&'static str> {
    ATTR_MAP.iter().find(|m| m.attr == attr).map(|m| m.header)
}

/// Look up the attribute mapped to a header name, ignoring case.
pub fn attr_for_header(header: &str) -> Option<&'static str> {
    ATTR_MAP
        .iter()
        .find(|m| m.header.eq_ignore_ascii_case(header))
        .map(|m| m.attr)
}

/// Chunk metadata: attribute key to string value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkMetadata(BTreeMap<String, String>);

impl ChunkMetadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by attribute key.
    pub fn get(&self, attr: &str) -> Option<&str> {
        self.0.get(attr).map(String::as_str)
    }

    /// Set a value, returning the previous one.
    pub fn insert(&mut self, attr: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(attr.into(), value.into())
    }

    /// Whether an attribute is present.
    pub fn contains(&self, attr: &str) -> bool {
        self.0.contains_key(attr)
    }

    /// The first mandatory attribute that is absent, if any.
    pub fn missing_mandatory(&self) -> Option<&'static str> {
        MANDATORY_ATTRS.iter().copied().find(|k| !self.contains(k))
    }

    /// Iterate over (attribute, value) pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ChunkMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
