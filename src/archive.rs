//! ZIP packaging of transformed assets.

use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{PipelineError, Result};
use crate::hashing::{compute_manifest_hash, sha256_hex};

/// Top-level directory inside every archive.
pub const ARCHIVE_DIR: &str = "Resized";
pub const ARCHIVE_MIME: &str = "application/zip";

#[derive(Debug, Clone)]
pub struct TransformedAsset {
    pub slot_id: String,
    pub target_width: u32,
    pub target_height: u32,
    pub encoded_bytes: Vec<u8>,
    pub output_filename: String,
}

impl TransformedAsset {
    pub fn archive_path(&self) -> String {
        format!("{}/{}", ARCHIVE_DIR, self.output_filename)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub slot_id: String,
    pub path: String,
    pub size: [u32; 2],
    pub bytes: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub name_prefix: String,
    pub slot_table: String,
    pub entries: Vec<ManifestEntry>,
    pub manifest_hash: String,
}

/// Finished archive, ready to hand to the collaborator.
#[derive(Debug, Clone)]
pub struct Archive {
    pub filename: String,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
    pub manifest: ArchiveManifest,
}

impl Archive {
    pub fn sha256(&self) -> String {
        sha256_hex(&self.data)
    }
}

pub fn archive_filename(name_prefix: &str) -> String {
    format!("{}_resized_images.zip", name_prefix)
}

/// Write every asset, in order, into one DEFLATE-compressed ZIP.
///
/// Entries carry a fixed timestamp so identical inputs give identical bytes.
pub fn build_archive(name_prefix: &str, slot_table: &str, assets: &[TransformedAsset]) -> Result<Archive> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = Vec::with_capacity(assets.len());

    for asset in assets {
        let path = asset.archive_path();
        debug!(slot = %asset.slot_id, path = %path, bytes = asset.encoded_bytes.len(), "adding archive entry");

        let written = writer.start_file(path.as_str(), options)
            .map_err(|e| e.to_string())
            .and_then(|()| writer.write_all(&asset.encoded_bytes).map_err(|e| e.to_string()));
        if let Err(reason) = written {
            return Err(PipelineError::EncodeFailed { slot_id: asset.slot_id.clone(), reason });
        }

        entries.push(ManifestEntry {
            slot_id: asset.slot_id.clone(),
            path,
            size: [asset.target_width, asset.target_height],
            bytes: asset.encoded_bytes.len(),
            sha256: sha256_hex(&asset.encoded_bytes),
        });
    }

    let data = writer.finish()?.into_inner();

    let mut manifest = ArchiveManifest {
        name_prefix: name_prefix.to_string(),
        slot_table: slot_table.to_string(),
        entries,
        manifest_hash: String::new(),
    };
    manifest.manifest_hash = compute_manifest_hash(&manifest)?;

    Ok(Archive {
        filename: archive_filename(name_prefix),
        mime_type: ARCHIVE_MIME,
        data,
        manifest,
    })
}
