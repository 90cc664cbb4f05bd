//! JSON artifact I/O with an optional zstd sibling.
//!
//! Artifacts are written atomically (to a temp file first, then renamed)
//! so a reader never sees a half-written index. With compression on,
//! `combined-index.json` also gets `combined-index.json.zst` and a
//! `combined-index.json.zst.meta` sidecar describing the encoding.
//!
//! Reading sniffs the zstd magic bytes, so either file can be handed to
//! [`read_json`] or [`decode`].

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// zstd compression level for published artifacts.
const ZSTD_LEVEL: i32 = 19;

/// Frame magic number that starts every zstd stream.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Contents of the `.meta` sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionMeta {
    /// Always `application/json`.
    pub content_type: String,
    /// Always `zstd`.
    pub content_encoding: String,
    /// Uncompressed size in bytes.
    pub original_size: u64,
    /// Compressed size in bytes.
    pub compressed_size: u64,
    /// Compressed size as a percentage of the original, e.g. `"12.4%"`.
    pub compression_ratio: String,
}

/// Files produced by [`write_json`].
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    /// The JSON file.
    pub path: PathBuf,
    /// JSON size in bytes.
    pub size_bytes: u64,
    /// The `.zst` file, when compression was requested.
    pub compressed_path: Option<PathBuf>,
    /// `.zst` size in bytes.
    pub compressed_size_bytes: Option<u64>,
}

/// Returns `<path>.zst`.
#[must_use]
pub fn compressed_path(path: &Path) -> PathBuf {
    append_extension(path, "zst")
}

/// Returns `<path>.zst.meta`.
#[must_use]
pub fn meta_path(path: &Path) -> PathBuf {
    append_extension(&compressed_path(path), "meta")
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Returns `true` if `bytes` begins with a zstd frame.
#[must_use]
pub fn is_zstd(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZSTD_MAGIC)
}

/// Serializes `value` to `path`, plus a `.zst` copy and its `.meta`
/// sidecar when `compress` is set.
///
/// # Errors
///
/// Returns an error if serialization, compression, or any file write
/// fails.
pub fn write_json<T: Serialize>(
    value: &T,
    path: &Path,
    compress: bool,
) -> Result<WrittenArtifact, ArtifactError> {
    log::info!("Writing {}", path.display());

    let json = serde_json::to_vec(value).map_err(|e| ArtifactError::Json {
        path: path.display().to_string(),
        source: e,
    })?;

    write_atomic(path, &json)?;
    let size_bytes = json.len() as u64;

    #[allow(clippy::cast_precision_loss)]
    let mb = size_bytes as f64 / 1_048_576.0;
    log::info!("  JSON size: {mb:.1} MB");

    if !compress {
        return Ok(WrittenArtifact {
            path: path.to_path_buf(),
            size_bytes,
            compressed_path: None,
            compressed_size_bytes: None,
        });
    }

    let zst_path = compressed_path(path);
    let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL).map_err(|e| {
        ArtifactError::Io {
            path: zst_path.display().to_string(),
            source: e,
        }
    })?;
    write_atomic(&zst_path, &compressed)?;
    let compressed_size = compressed.len() as u64;

    let meta = CompressionMeta {
        content_type: "application/json".to_string(),
        content_encoding: "zstd".to_string(),
        original_size: size_bytes,
        compressed_size,
        compression_ratio: ratio_percent(compressed_size, size_bytes),
    };
    let meta_file = meta_path(path);
    let meta_json = serde_json::to_vec_pretty(&meta).map_err(|e| ArtifactError::Json {
        path: meta_file.display().to_string(),
        source: e,
    })?;
    write_atomic(&meta_file, &meta_json)?;

    #[allow(clippy::cast_precision_loss)]
    let compressed_mb = compressed_size as f64 / 1_048_576.0;
    log::info!(
        "  compressed size: {compressed_mb:.1} MB ({})",
        meta.compression_ratio
    );

    Ok(WrittenArtifact {
        path: path.to_path_buf(),
        size_bytes,
        compressed_path: Some(zst_path),
        compressed_size_bytes: Some(compressed_size),
    })
}

/// Reads and deserializes a JSON artifact, decompressing it first if it
/// is a zstd frame.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable, or not valid
/// JSON for `T`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.display().to_string()));
    }

    log::debug!("Reading {}", path.display());

    let bytes = std::fs::read(path).map_err(|e| ArtifactError::Io {
        path: path.display().to_string(),
        source: e,
    })?;

    decode(&bytes, &path.display().to_string())
}

/// Deserializes artifact bytes from any source, decompressing them first
/// if they are a zstd frame. `location` is only used in error messages.
///
/// # Errors
///
/// Returns an error if decompression fails or the bytes are not valid
/// JSON for `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8], location: &str) -> Result<T, ArtifactError> {
    if is_zstd(bytes) {
        let json = zstd::decode_all(bytes).map_err(|e| ArtifactError::Io {
            path: location.to_string(),
            source: e,
        })?;
        return serde_json::from_slice(&json).map_err(|e| ArtifactError::Json {
            path: location.to_string(),
            source: e,
        });
    }

    serde_json::from_slice(bytes).map_err(|e| ArtifactError::Json {
        path: location.to_string(),
        source: e,
    })
}

/// Writes `bytes` to a temp file beside `path`, then renames it into
/// place. Parent directories are created as needed.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ArtifactError::Io {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let tmp_path = append_extension(path, "tmp");

    std::fs::write(&tmp_path, bytes).map_err(|e| ArtifactError::Io {
        path: tmp_path.display().to_string(),
        source: e,
    })?;

    std::fs::rename(&tmp_path, path).map_err(|e| ArtifactError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

fn ratio_percent(part: u64, whole: u64) -> String {
    if whole == 0 {
        return "0.0%".to_string();
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = part as f64 / whole as f64 * 100.0;
    format!("{ratio:.1}%")
}

/// Errors from artifact operations.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Artifact file not found.
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// JSON encode or decode error.
    #[error("JSON error in {path}: {source}")]
    Json {
        /// Path or URL of the artifact.
        path: String,
        /// Underlying error.
        source: serde_json::Error,
    },

    /// I/O or decompression error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path or URL of the artifact.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
}
