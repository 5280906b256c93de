//! Gzip-compressed JSON payload output.
//!
//! The payload is written to `<name>.tmp` next to the destination and then
//! renamed into place, so readers never see a partially written file and a
//! failed run leaves any previous payload untouched.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::ExportError;
use crate::logging::{self, Stage};
use crate::model::Payload;

/// Checks the destination before any database work happens: rejects a
/// directory and creates missing parent directories.
pub fn prepare_output_path(path: &Path) -> Result<(), ExportError> {
    if path.is_dir() {
        return Err(ExportError::OutputIsDirectory(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ExportError::io(parent, e))?;
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("payload"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serializes `payload` as compact JSON into a gzip stream.
pub fn encode_payload<W: Write>(payload: &Payload, writer: W) -> Result<W, ExportError> {
    let mut encoder = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, payload)?;
    encoder.finish().map_err(|e| ExportError::io("<gzip stream>", e))
}

/// Writes the payload to `path`. Returns the compressed size in bytes.
pub fn write_payload(path: &Path, payload: &Payload) -> Result<u64, ExportError> {
    if path.is_dir() {
        return Err(ExportError::OutputIsDirectory(path.to_path_buf()));
    }

    let tmp = temp_path_for(path);
    let result = write_compressed(&tmp, payload).and_then(|size| {
        fs::rename(&tmp, path).map_err(|e| ExportError::io(path, e))?;
        Ok(size)
    });

    if result.is_err() {
        discard_temp(&tmp);
    }
    result
}

/// Removes a leftover temp file after a failed write. Returns `false` (and
/// logs a warning) when the file could not be removed.
fn discard_temp(tmp: &Path) -> bool {
    match fs::remove_file(tmp) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            logging::warn(
                Stage::Output,
                Some(tmp.display().to_string().as_str()),
                &format!("Could not remove temp file: {}", e),
            );
            false
        }
    }
}

fn write_compressed(tmp: &Path, payload: &Payload) -> Result<u64, ExportError> {
    let file = File::create(tmp).map_err(|e| ExportError::io(tmp, e))?;
    let mut writer = encode_payload(payload, BufWriter::new(file))?;
    writer.flush().map_err(|e| ExportError::io(tmp, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| ExportError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| ExportError::io(tmp, e))?;
    let size = file.metadata().map_err(|e| ExportError::io(tmp, e))?.len();
    Ok(size)
}

/// Reads a payload file back. Used to verify what was written.
pub fn read_payload(path: &Path) -> Result<Payload, ExportError> {
    let file = File::open(path).map_err(|e| ExportError::io(path, e))?;
    let mut json = String::new();
    GzDecoder::new(BufReader::new(file))
        .read_to_string(&mut json)
        .map_err(|e| ExportError::io(path, e))?;
    Ok(serde_json::from_str(&json)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
