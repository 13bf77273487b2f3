// src/storage/mod.rs

//! Object store abstractions for payload persistence.
//!
//! Payloads are gzip-compressed and written under date-partitioned keys.
//! The default layout follows the hive convention:
//!
//! ```text
//! {prefix}/{dgroup}/year=2025/month=01/day=20/{identifier}.json.gz
//! ```
//!
//! Flat-date and unpartitioned layouts are available per dataset.

pub mod local;
#[cfg(feature = "s3")]
pub mod s3;

use std::io::Write;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;
use crate::models::{Candidate, PartitionScheme};

pub use local::LocalStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;

/// Receipt for a completed store write.
#[derive(Debug, Clone)]
pub struct PutReceipt {
    /// Fully qualified location, e.g. `s3://bucket/key` or `file:///...`
    pub location: String,

    /// Backend version identifier; empty when unversioned
    pub version_id: String,

    /// Backend content tag; empty when unavailable
    pub etag: String,
}

/// Blob store writer with hierarchical path partitioning.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a payload under the given key.
    ///
    /// `content_encoding` describes the payload encoding (the collector
    /// always sends gzip) and is recorded where the backend supports it.
    async fn put(&self, key: &str, body: &[u8], content_encoding: &str) -> Result<PutReceipt>;

    /// Whether an object already exists at the key.
    async fn exists(&self, key: &str) -> Result<bool>;
}

/// Build the object key for a candidate.
///
/// The `.gz` suffix is appended unless the identifier already carries it.
pub fn object_key(prefix: &str, scheme: PartitionScheme, candidate: &Candidate) -> String {
    let spec = &candidate.storage;
    let mut filename = candidate.identifier.clone();
    if !filename.ends_with(".gz") {
        filename.push_str(".gz");
    }

    let prefix = prefix.trim_end_matches('/');
    match scheme {
        PartitionScheme::HiveDate => format!(
            "{prefix}/{}/{}/{filename}",
            spec.dgroup,
            spec.file_date.format("year=%Y/month=%m/day=%d"),
        ),
        PartitionScheme::FlatDate => {
            format!("{prefix}/{}/{}/{filename}", spec.dgroup, spec.file_date)
        }
        PartitionScheme::Flat => format!("{prefix}/{}/{filename}", spec.dgroup),
    }
}

/// Gzip-compress a payload for storage.
pub fn gzip_compress(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::models::{RequestSpec, StorageSpec};

    use super::*;

    fn candidate(identifier: &str) -> Candidate {
        Candidate::new(
            identifier,
            RequestSpec::new("https://example.org", 30),
            StorageSpec {
                dgroup: "miso_da_exante_lmp".into(),
                file_date: NaiveDate::from_ymd_opt(2025, 1, 5).unwrap(),
                extension: "json".into(),
            },
        )
    }

    #[test]
    fn test_hive_key_layout() {
        let key = object_key("sourcing", PartitionScheme::HiveDate, &candidate("lmp_20250105.json"));
        assert_eq!(
            key,
            "sourcing/miso_da_exante_lmp/year=2025/month=01/day=05/lmp_20250105.json.gz"
        );
    }

    #[test]
    fn test_flat_date_key_layout() {
        let key = object_key("sourcing", PartitionScheme::FlatDate, &candidate("lmp.json"));
        assert_eq!(key, "sourcing/miso_da_exante_lmp/2025-01-05/lmp.json.gz");
    }

    #[test]
    fn test_gz_suffix_not_doubled() {
        let key = object_key("sourcing", PartitionScheme::Flat, &candidate("lmp.json.gz"));
        assert!(key.ends_with("/lmp.json.gz"));
        assert!(!key.ends_with(".gz.gz"));
    }

    #[test]
    fn test_trailing_slash_prefix_normalized() {
        let key = object_key("sourcing/", PartitionScheme::Flat, &candidate("x.json"));
        assert!(key.starts_with("sourcing/miso_da_exante_lmp/"));
    }

    #[test]
    fn test_gzip_round_trip() {
        use std::io::Read;

        let original = b"{\"data\":[1,2,3]}".repeat(50);
        let compressed = gzip_compress(&original).unwrap();
        assert!(compressed.len() < original.len());

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut restored = Vec::new();
        decoder.read_to_end(&mut restored).unwrap();
        assert_eq!(restored, original);
    }
}
