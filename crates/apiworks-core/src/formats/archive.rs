//! Zip archive encoding: `workspace.yaml` + `manifest.json`.

use super::{FormatError, owned_counts};
use crate::bundle::Bundle;
use crate::primitives::{MAX_PAYLOAD_SIZE, ZIP_BUNDLE_ENTRY, ZIP_MANIFEST_ENTRY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    workspace: String,
    counts: BTreeMap<String, u64>,
}

pub(super) fn write(bundle: &Bundle) -> Result<Vec<u8>, FormatError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let manifest = Manifest {
        format_version: bundle.format_version,
        workspace: bundle.workspace.name.clone(),
        counts: owned_counts(bundle),
    };

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(ZIP_BUNDLE_ENTRY, options)?;
    zip.write_all(serde_yaml::to_string(bundle)?.as_bytes())?;
    zip.start_file(ZIP_MANIFEST_ENTRY, options)?;
    zip.write_all(&serde_json::to_vec_pretty(&manifest)?)?;
    Ok(zip.finish()?.into_inner())
}

pub(super) fn read(bytes: &[u8]) -> Result<Bundle, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let document = read_entry(&mut archive, ZIP_BUNDLE_ENTRY)?;
    let bundle: Bundle = serde_yaml::from_slice(&document)?;

    // The manifest is advisory; when present its counts must agree.
    if archive.index_for_name(ZIP_MANIFEST_ENTRY).is_some() {
        let manifest: Manifest = serde_json::from_slice(&read_entry(&mut archive, ZIP_MANIFEST_ENTRY)?)?;
        for (kind, count) in owned_counts(&bundle) {
            if manifest.counts.get(&kind).copied().unwrap_or(0) != count {
                return Err(FormatError::CountMismatch(kind));
            }
        }
    }
    Ok(bundle)
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &'static str) -> Result<Vec<u8>, FormatError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Err(FormatError::MissingEntry(name)),
        Err(e) => return Err(e.into()),
    };
    let declared = entry.size() as usize;
    if declared > MAX_PAYLOAD_SIZE {
        return Err(FormatError::TooLarge {
            size: declared,
            max: MAX_PAYLOAD_SIZE,
        });
    }
    let mut out = Vec::with_capacity(declared);
    entry.take(MAX_PAYLOAD_SIZE as u64 + 1).read_to_end(&mut out)?;
    if out.len() > MAX_PAYLOAD_SIZE {
        return Err(FormatError::TooLarge {
            size: out.len(),
            max: MAX_PAYLOAD_SIZE,
        });
    }
    Ok(out)
}
