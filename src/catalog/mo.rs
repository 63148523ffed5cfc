//! GNU MO (machine object) compiler.
//!
//! Layout, all integers little-endian u32:
//!
//! ```text
//!  0  magic 0x950412de
//!  4  revision 0
//!  8  N, number of strings
//! 12  offset of original-strings descriptors (28)
//! 16  offset of translation descriptors (28 + 8N)
//! 20  hash table size (0)
//! 24  hash table offset (28 + 16N)
//! 28  N x (length, offset) originals, then N x (length, offset) translations
//!     originals then translations, each NUL terminated
//! ```
//!
//! No hash table is emitted: size 0 with the offset pointing at the start of
//! the string blob, as `msgfmt --no-hash` does. Readers binary-search the
//! sorted originals table instead.

use super::entry::{Catalog, CatalogEntry};
use super::serializer::HeaderMetadata;
use crate::error::Result;
use crate::storage::Storage;
use std::path::Path;
use tracing::info;

pub const MO_MAGIC: u32 = 0x950412de;
const HEADER_SIZE: usize = 28;
const DESCRIPTOR_SIZE: usize = 8;

/// Append `value` as little-endian.
pub fn write_u32_le(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Decode a little-endian u32 at `offset`, if in bounds.
pub fn read_u32_le(bytes: &[u8], offset: usize) -> Option<u32> {
    let chunk = bytes.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoOptions {
    /// Emit fuzzy translations too (msgfmt's `--use-fuzzy`)
    pub include_fuzzy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoStats {
    /// Strings in the table, header included
    pub strings: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MoCompiler {
    metadata: HeaderMetadata,
    options: MoOptions,
}

impl MoCompiler {
    pub fn new(metadata: HeaderMetadata, options: MoOptions) -> Self {
        Self { metadata, options }
    }

    /// Compile the catalog. Output is a pure function of the input.
    ///
    /// The header is always entry 0. Untranslated entries are left out so
    /// lookups fall back to the source string; fuzzy ones too unless
    /// [`MoOptions::include_fuzzy`] is set.
    pub fn compile(&self, catalog: &Catalog) -> Vec<u8> {
        let header = match catalog.header() {
            Some(header) => header.msgstr.clone(),
            None => self.metadata.render(),
        };

        let mut pairs: Vec<(Vec<u8>, Vec<u8>)> = vec![(Vec::new(), header.into_bytes())];
        pairs.extend(
            catalog
                .messages()
                .filter(|e| e.has_translation())
                .filter(|e| self.options.include_fuzzy || !e.is_fuzzy())
                .map(flatten),
        );
        pairs.sort_by(|a, b| a.0.cmp(&b.0));

        encode(&pairs)
    }

    /// Compile and write through `storage`.
    pub fn write<S: Storage + ?Sized>(
        &self,
        storage: &S,
        path: &Path,
        catalog: &Catalog,
    ) -> Result<MoStats> {
        let bytes = self.compile(catalog);
        storage.write(path, &bytes)?;
        let stats = MoStats {
            strings: read_u32_le(&bytes, 8).unwrap_or(0) as usize,
            bytes: bytes.len(),
        };
        info!(
            "MO file compiled: {} ({} strings, {} bytes)",
            path.display(),
            stats.strings,
            stats.bytes
        );
        Ok(stats)
    }
}

/// Compile with default metadata and options.
pub fn compile(catalog: &Catalog) -> Vec<u8> {
    MoCompiler::default().compile(catalog)
}

/// Plural entries become `msgid\0msgid_plural` → `msgstr[0]\0msgstr[1]...`.
fn flatten(entry: &CatalogEntry) -> (Vec<u8>, Vec<u8>) {
    match &entry.msgid_plural {
        Some(plural) => {
            let key = format!("{}\0{}", entry.msgid, plural);
            let forms: Vec<&str> = entry.msgstr_plural.values().map(String::as_str).collect();
            (key.into_bytes(), forms.join("\0").into_bytes())
        }
        None => (
            entry.msgid.clone().into_bytes(),
            entry.msgstr.clone().into_bytes(),
        ),
    }
}

/// Lay out sorted `(original, translation)` pairs. Offsets are u32, which
/// caps a catalog at 4 GiB.
fn encode(pairs: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let n = pairs.len();
    let originals_offset = HEADER_SIZE;
    let translations_offset = originals_offset + n * DESCRIPTOR_SIZE;
    let blob_offset = translations_offset + n * DESCRIPTOR_SIZE;
    let blob_len: usize = pairs.iter().map(|(k, v)| k.len() + v.len() + 2).sum();

    let mut out = Vec::with_capacity(blob_offset + blob_len);
    write_u32_le(&mut out, MO_MAGIC);
    write_u32_le(&mut out, 0);
    write_u32_le(&mut out, n as u32);
    write_u32_le(&mut out, originals_offset as u32);
    write_u32_le(&mut out, translations_offset as u32);
    write_u32_le(&mut out, 0);
    write_u32_le(&mut out, blob_offset as u32);

    let mut cursor = blob_offset;
    for (original, _) in pairs {
        write_u32_le(&mut out, original.len() as u32);
        write_u32_le(&mut out, cursor as u32);
        cursor += original.len() + 1;
    }
    for (_, translation) in pairs {
        write_u32_le(&mut out, translation.len() as u32);
        write_u32_le(&mut out, cursor as u32);
        cursor += translation.len() + 1;
    }

    for (original, _) in pairs {
        out.extend_from_slice(original);
        out.push(0);
    }
    for (_, translation) in pairs {
        out.extend_from_slice(translation);
        out.push(0);
    }
    out
}
