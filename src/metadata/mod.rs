//! Provenance-record rewriting.
//!
//! Installing an artifact leaves a `direct_url.json` provenance record
//! in the tree's dist-info directory, pointing at wherever the
//! installer happened to read the artifact from (usually the scratch
//! directory, which the next build deletes). After staging, the record
//! is rewritten to point at the artifact's permanent home in `dist/`.
//!
//! The record path is derived from the package name, version, and the
//! runtime's site-packages directory, never discovered by searching.
//! Unknown fields in the record survive the rewrite untouched.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::artifact::BuildResult;
use crate::core::descriptor::PackageDescriptor;
use crate::util::fs::atomic_replace;

/// File name of the provenance record inside a dist-info directory.
pub const PROVENANCE_FILE: &str = "direct_url.json";

/// Errors from provenance rewriting.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("provenance record not found: expected `{}`", path.display())]
    Missing { path: PathBuf },

    #[error("provenance record at `{}` is not valid JSON", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not rewrite provenance record at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// A `direct_url.json` provenance record.
///
/// Only the fields the rewrite touches are typed; everything else is
/// carried through `extra` so the record round-trips losslessly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Location the artifact was installed from, as a URL.
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_info: Option<ArchiveInfo>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `archive_info` block of a provenance record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveInfo {
    /// Legacy single-hash field, `sha256=<digest>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub hashes: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Deterministic path of a build's provenance record.
pub fn provenance_path(result: &BuildResult, descriptor: &PackageDescriptor) -> PathBuf {
    result.dist_info_dir(descriptor).join(PROVENANCE_FILE)
}

/// Point a build's provenance record at the staged artifact.
///
/// Reads the record, replaces its url with a `file://` URL for the
/// absolute artifact path, refreshes the archive hash from the build's
/// digest, and writes the result back atomically. Returns the record's
/// path.
pub fn rewrite_provenance(
    result: &BuildResult,
    descriptor: &PackageDescriptor,
) -> Result<PathBuf, MetadataError> {
    let path = provenance_path(result, descriptor);

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MetadataError::Missing { path });
        }
        Err(e) => {
            return Err(MetadataError::Io {
                path,
                source: e.into(),
            });
        }
    };

    let mut record: ProvenanceRecord =
        serde_json::from_str(&contents).map_err(|source| MetadataError::Corrupt {
            path: path.clone(),
            source,
        })?;

    record.url = artifact_url(&result.artifact, &path)?;
    let info = record.archive_info.get_or_insert_with(ArchiveInfo::default);
    info.hashes
        .insert("sha256".to_string(), result.digest.clone());
    info.hash = Some(format!("sha256={}", result.digest));

    let mut bytes = serde_json::to_vec_pretty(&record).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source: source.into(),
    })?;
    bytes.push(b'\n');

    atomic_replace(&path, &bytes).map_err(|source| MetadataError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::debug!("rewrote provenance record at {}", path.display());
    Ok(path)
}

/// The artifact's permanent location as a `file://` URL.
fn artifact_url(artifact: &Path, record_path: &Path) -> Result<String, MetadataError> {
    let absolute = std::path::absolute(artifact).map_err(|e| MetadataError::Io {
        path: record_path.to_path_buf(),
        source: anyhow::Error::from(e)
            .context(format!("cannot resolve `{}`", artifact.display())),
    })?;

    url::Url::from_file_path(&absolute)
        .map(|url| url.to_string())
        .map_err(|_| MetadataError::Io {
            path: record_path.to_path_buf(),
            source: anyhow::anyhow!(
                "cannot express `{}` as a file URL",
                absolute.display()
            ),
        })
}
