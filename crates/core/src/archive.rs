//! ZIP packaging of a batch.

use crate::config::{Archive, ArchiveConfig};
use crate::error::{CertificateError, Result};
use crate::model::GenerationResult;
use chrono::Local;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Clean a display name for use inside a file name.
///
/// Keeps ASCII letters, digits, spaces and hyphens, turns whitespace runs into
/// single hyphens, lowercases, truncates to `max_len` and trims hyphens from
/// the ends. An empty result becomes `unnamed`.
pub fn sanitize_component(value: &str, max_len: usize) -> String {
    let filtered: String = value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();
    let mut joined = filtered.split_whitespace().collect::<Vec<_>>().join("-");
    joined.make_ascii_lowercase();
    joined.truncate(max_len);
    let trimmed = joined.trim_matches('-');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Encode a participant id for use inside a file name.
///
/// ASCII letters, digits, `_` and `.` are kept; every other byte of the UTF-8
/// form (including `-` and `%`) becomes `%XX`. The encoding is injective and
/// never contains `-` or `~`, so the id is always the text after the last
/// hyphen of an entry name. See [`decode_id`].
pub fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverse [`encode_id`]. Returns `None` for text `encode_id` cannot produce.
pub fn decode_id(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                if !hex.bytes().all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b)) {
                    return None;
                }
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}

/// Single-owner ZIP writer that keeps entry names unique.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    names: HashSet<String>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new(config: &ArchiveConfig) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(config.compression_level as i64))
            .unix_permissions(0o644);
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            names: HashSet::new(),
            entries: 0,
        }
    }

    /// Add an entry. A name already in the archive gets a `~2`, `~3`, ...
    /// suffix before the extension. Returns the name actually written.
    pub fn add(&mut self, name: &str, data: &[u8]) -> Result<String> {
        let name = self.unique_name(name);
        self.writer.start_file(name.as_str(), self.options)?;
        self.writer
            .write_all(data)
            .map_err(|e| CertificateError::Packaging(format!("writing '{}': {}", name, e)))?;
        self.names.insert(name.clone());
        self.entries += 1;
        Ok(name)
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.names.contains(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (name, String::new()),
        };
        (2..)
            .map(|n| format!("{}~{}{}", stem, n, ext))
            .find(|candidate| !self.names.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Close the archive and return its bytes and entry count.
    pub fn finish(self) -> Result<(Vec<u8>, usize)> {
        let cursor = self.writer.finish()?;
        Ok((cursor.into_inner(), self.entries))
    }
}

/// Packages generation results into a single archive.
#[derive(Debug, Clone, Default)]
pub struct ArchivePackager {
    config: ArchiveConfig,
}

impl ArchivePackager {
    pub fn new(config: ArchiveConfig) -> Self {
        Self { config }
    }

    /// Entry name for one result.
    pub fn entry_name(&self, result: &GenerationResult) -> String {
        let max = self.config.max_name_length;
        let name = sanitize_component(&result.participant_name, max);
        let id = encode_id(&result.participant_id);
        match &result.outcome {
            Ok(_) => format!(
                "certificate-{}-{}.{}",
                name, id, self.config.document_extension
            ),
            Err(_) => format!("ERROR-{}-{}.txt", name, id),
        }
    }

    /// Suggested archive file name for an event.
    pub fn archive_file_name(&self, event_title: &str) -> String {
        format!(
            "certificates-{}-{}.zip",
            sanitize_component(event_title, self.config.max_name_length),
            Local::now().format("%Y%m%d-%H%M%S")
        )
    }

    /// Write every result into a new archive.
    ///
    /// Successful results become documents; failures become short text files
    /// carrying the error message.
    pub fn pack(&self, results: &[GenerationResult], event_title: &str) -> Result<Archive> {
        let mut builder = ArchiveBuilder::new(&self.config);

        for result in results {
            let entry = self.entry_name(result);
            let written = match &result.outcome {
                Ok(document) => builder.add(&entry, document)?,
                Err(message) => {
                    let body = format!(
                        "Certificate generation failed for {} (id {}).\n\nError: {}\n",
                        result.participant_name, result.participant_id, message
                    );
                    builder.add(&entry, body.as_bytes())?
                }
            };
            debug!("Archived {}", written);
        }

        let (bytes, entry_count) = builder.finish()?;
        let file_name = self.archive_file_name(event_title);
        info!(
            "Packaged {} entries into {} ({} bytes)",
            entry_count,
            file_name,
            bytes.len()
        );

        Ok(Archive {
            file_name,
            bytes,
            entry_count,
        })
    }
}
