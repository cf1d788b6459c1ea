//! ZIP uploads
//!
//! A ZIP upload carries one JSON manifest (`data.json`, `*-data.json`, or the
//! only JSON file present) plus the document files it references through
//! `content_file`. Archives are often created by zipping a folder, so names
//! are resolved relative to the longest directory prefix shared by every entry.

use std::io::{Cursor, Read};

use axum::body::Bytes;
use cfp_common::MessageSet;
use thiserror::Error;
use zip::result::ZipError;
use zip::ZipArchive;

use crate::paper::document::{DocumentImporter, DocumentJson};

/// ZIP errors surfaced to API clients
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Bad ZIP file ({0})")]
    BadArchive(#[from] ZipError),

    #[error("{0}: File not found")]
    NotFound(String),

    #[error("{0}: File too large")]
    TooLarge(String),

    #[error("{0}: {1}")]
    Read(String, std::io::Error),
}

/// Find the shared directory prefix and the manifest among `names`
///
/// The prefix is either empty or ends with `/`. The manifest is `None` when
/// no unambiguous candidate exists.
pub fn analyze_zip_contents<S: AsRef<str>>(names: &[S]) -> (String, Option<String>) {
    let mut dirpfx: Option<String> = None;
    for name in names.iter().map(AsRef::as_ref) {
        let pfx = dirpfx.get_or_insert_with(|| match name.rfind('/') {
            Some(slash) if slash > 0 => name[..=slash].to_string(),
            _ => String::new(),
        });
        while !pfx.is_empty() && !name.starts_with(pfx.as_str()) {
            // drop the last directory component, keeping the trailing slash
            let trimmed = &pfx[..pfx.len() - 1];
            *pfx = match trimmed.rfind('/') {
                Some(slash) if slash > 0 => trimmed[..=slash].to_string(),
                _ => String::new(),
            };
        }
        if pfx.is_empty() {
            break;
        }
    }
    let dirpfx = dirpfx.unwrap_or_default();

    let mut jsons = Vec::new();
    let mut datas = Vec::new();
    for name in names.iter().map(AsRef::as_ref) {
        let Some(rest) = name.strip_prefix(dirpfx.as_str()) else {
            continue;
        };
        if !rest.ends_with(".json") || rest.contains('/') || rest.starts_with('.') {
            continue;
        }
        jsons.push(name);
        if rest == "data.json" || rest.ends_with("-data.json") || rest.ends_with("_data.json") {
            datas.push(name);
        }
    }

    let manifest = match (datas.as_slice(), jsons.as_slice()) {
        ([data], _) => Some(data.to_string()),
        (_, [json]) => Some(json.to_string()),
        _ => None,
    };
    (dirpfx, manifest)
}

/// An uploaded archive held in memory
#[derive(Debug, Clone)]
pub struct ZipContent {
    bytes: Bytes,
    names: Vec<String>,
}

impl ZipContent {
    /// Open an archive, validating its central directory
    pub fn open(bytes: Bytes) -> Result<Self, ArchiveError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.clone()))?;
        // `file_names` is unordered; keep archive order for prefix detection
        let mut names = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            names.push(archive.by_index_raw(i)?.name().to_string());
        }
        Ok(Self { bytes, names })
    }

    fn archive(&self) -> Result<ZipArchive<Cursor<Bytes>>, ArchiveError> {
        Ok(ZipArchive::new(Cursor::new(self.bytes.clone()))?)
    }

    /// Entry names in archive order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn analyze(&self) -> (String, Option<String>) {
        analyze_zip_contents(&self.names)
    }

    /// Read one entry, refusing entries larger than `max_bytes`
    pub fn read(&self, name: &str, max_bytes: u64) -> Result<Vec<u8>, ArchiveError> {
        let mut archive = self.archive()?;
        let mut file = match archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Err(ArchiveError::NotFound(name.to_string())),
            Err(e) => return Err(e.into()),
        };
        if file.is_dir() {
            return Err(ArchiveError::NotFound(name.to_string()));
        }
        if file.size() > max_bytes {
            return Err(ArchiveError::TooLarge(name.to_string()));
        }
        // the declared size can lie; never inflate past the limit
        let mut content = Vec::with_capacity(file.size() as usize);
        (&mut file)
            .take(max_bytes.saturating_add(1))
            .read_to_end(&mut content)
            .map_err(|e| ArchiveError::Read(name.to_string(), e))?;
        if content.len() as u64 > max_bytes {
            return Err(ArchiveError::TooLarge(name.to_string()));
        }
        Ok(content)
    }

    pub fn read_to_string(&self, name: &str, max_bytes: u64) -> Result<String, ArchiveError> {
        let content = self.read(name, max_bytes)?;
        String::from_utf8(content).map_err(|e| {
            ArchiveError::Read(
                name.to_string(),
                std::io::Error::new(std::io::ErrorKind::InvalidData, e),
            )
        })
    }
}

/// Resolves `content_file` references against an uploaded archive
#[derive(Debug, Clone)]
pub struct ZipDocumentImporter {
    archive: ZipContent,
    docdir: String,
    max_document_bytes: u64,
}

impl ZipDocumentImporter {
    pub fn new(archive: ZipContent, docdir: String, max_document_bytes: u64) -> Self {
        Self {
            archive,
            docdir,
            max_document_bytes,
        }
    }

    /// Load `filename` into `doc`, reporting problems at `field`
    pub fn apply_content_file(
        &self,
        doc: &mut DocumentJson,
        filename: &str,
        field: &str,
        messages: &mut MessageSet,
    ) -> bool {
        match self.archive.read(filename, self.max_document_bytes) {
            Ok(content) => {
                doc.content = Some(content);
                doc.content_file = None;
                if doc.filename.is_none() {
                    doc.filename = Some(match filename.find('/') {
                        Some(slash) if slash > 0 => filename[slash + 1..].to_string(),
                        _ => filename.to_string(),
                    });
                }
                true
            }
            Err(e) => {
                messages.error_at(Some(field), e.to_string());
                false
            }
        }
    }
}

impl DocumentImporter for ZipDocumentImporter {
    fn import(&self, doc: &mut DocumentJson, field: &str, messages: &mut MessageSet) -> bool {
        match doc.content_file.clone() {
            Some(file) => {
                let filename = format!("{}{}", self.docdir, file);
                self.apply_content_file(doc, &filename, field, messages)
            }
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::{FileOptions, ZipWriter};

    fn make_zip(entries: &[(&str, &[u8])]) -> Bytes {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            zip.start_file::<_, ()>(*name, FileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        Bytes::from(zip.finish().unwrap().into_inner())
    }

    #[test]
    fn test_prefix_and_plain_data_json() {
        let (pfx, manifest) =
            analyze_zip_contents(&["export/data.json", "export/p1.pdf", "export/p2.pdf"]);
        assert_eq!(pfx, "export/");
        assert_eq!(manifest.as_deref(), Some("export/data.json"));
    }

    #[test]
    fn test_prefix_narrows_to_common_parent() {
        let (pfx, manifest) = analyze_zip_contents(&[
            "a/b/c/data.json",
            "a/b/d/p1.pdf",
            "a/b/readme.json",
        ]);
        assert_eq!(pfx, "a/b/");
        // data.json sits below the prefix, so only readme.json qualifies
        assert_eq!(manifest.as_deref(), Some("a/b/readme.json"));
    }

    #[test]
    fn test_no_common_prefix() {
        let (pfx, manifest) = analyze_zip_contents(&["x/p1.pdf", "y/p2.pdf", "data.json"]);
        assert_eq!(pfx, "");
        assert_eq!(manifest.as_deref(), Some("data.json"));
    }

    #[test]
    fn test_suffixed_data_json_preferred_over_other_jsons() {
        let (_, manifest) =
            analyze_zip_contents(&["conf-data.json", "settings.json", "paper.pdf"]);
        assert_eq!(manifest.as_deref(), Some("conf-data.json"));

        let (_, manifest) = analyze_zip_contents(&["conf_data.json", "settings.json"]);
        assert_eq!(manifest.as_deref(), Some("conf_data.json"));
    }

    #[test]
    fn test_ambiguous_manifests() {
        let (_, manifest) = analyze_zip_contents(&["a-data.json", "b-data.json"]);
        assert_eq!(manifest, None);

        let (_, manifest) = analyze_zip_contents(&["one.json", "two.json"]);
        assert_eq!(manifest, None);
    }

    #[test]
    fn test_hidden_and_lookalike_files_ignored() {
        let (_, manifest) =
            analyze_zip_contents(&["dir/.data.json", "dir/metadata.json", "dir/x.pdf"]);
        // `metadata.json` is not a data manifest but is the only visible JSON
        assert_eq!(manifest.as_deref(), Some("dir/metadata.json"));
    }

    #[test]
    fn test_empty_archive() {
        let names: [&str; 0] = [];
        assert_eq!(analyze_zip_contents(&names), (String::new(), None));
    }

    #[test]
    fn test_zip_content_read_and_limits() {
        let zip = ZipContent::open(make_zip(&[
            ("pkg/data.json", b"[]"),
            ("pkg/paper.pdf", b"%PDF-1.5 body"),
        ]))
        .unwrap();

        assert_eq!(zip.names(), &["pkg/data.json", "pkg/paper.pdf"]);
        assert_eq!(zip.analyze(), ("pkg/".to_string(), Some("pkg/data.json".to_string())));
        assert_eq!(zip.read_to_string("pkg/data.json", 100).unwrap(), "[]");
        assert!(matches!(zip.read("pkg/missing.pdf", 100), Err(ArchiveError::NotFound(_))));
        assert!(matches!(zip.read("pkg/paper.pdf", 4), Err(ArchiveError::TooLarge(_))));
    }

    /// Rewrite the uncompressed size recorded for every entry
    fn falsify_sizes(bytes: &[u8], size: u32) -> Bytes {
        let mut out = bytes.to_vec();
        let patch = |out: &mut Vec<u8>, sig: &[u8], offset: usize| {
            let mut i = 0;
            while i + offset + 4 <= out.len() {
                if out[i..].starts_with(sig) {
                    out[i + offset..i + offset + 4].copy_from_slice(&size.to_le_bytes());
                }
                i += 1;
            }
        };
        patch(&mut out, b"PK\x03\x04", 22);
        patch(&mut out, b"PK\x01\x02", 24);
        Bytes::from(out)
    }

    #[test]
    fn test_read_bounded_when_declared_size_lies() {
        let big = vec![b'x'; 64 * 1024];
        let zip = ZipContent::open(falsify_sizes(&make_zip(&[("big.pdf", &big)]), 10)).unwrap();

        assert!(matches!(zip.read("big.pdf", 1000), Err(ArchiveError::TooLarge(_))));
        assert!(matches!(zip.read_to_string("big.pdf", 1000), Err(ArchiveError::TooLarge(_))));
        assert_eq!(zip.read("big.pdf", big.len() as u64).unwrap().len(), big.len());
    }

    #[test]
    fn test_open_rejects_garbage() {
        let err = ZipContent::open(Bytes::from_static(b"definitely not a zip")).unwrap_err();
        assert!(err.to_string().starts_with("Bad ZIP file"));
    }

    #[test]
    fn test_importer_sets_content_and_filename() {
        let zip = ZipContent::open(make_zip(&[("pkg/data.json", b"{}"), ("pkg/p1.pdf", b"%PDF-")]))
            .unwrap();
        let importer = ZipDocumentImporter::new(zip, "pkg/".to_string(), 1000);
        let mut doc = DocumentJson {
            content_file: Some("p1.pdf".to_string()),
            ..Default::default()
        };
        let mut ms = MessageSet::new();

        assert!(importer.import(&mut doc, "submission", &mut ms));
        assert_eq!(doc.content.as_deref(), Some(&b"%PDF-"[..]));
        assert_eq!(doc.content_file, None);
        assert_eq!(doc.filename.as_deref(), Some("p1.pdf"));
        assert!(ms.is_empty());
    }

    #[test]
    fn test_importer_reports_missing_file() {
        let zip = ZipContent::open(make_zip(&[("data.json", b"{}")])).unwrap();
        let importer = ZipDocumentImporter::new(zip, String::new(), 1000);
        let mut doc = DocumentJson {
            content_file: Some("nope.pdf".to_string()),
            ..Default::default()
        };
        let mut ms = MessageSet::new();

        assert!(!importer.import(&mut doc, "final", &mut ms));
        let mi = &ms.message_list()[0];
        assert_eq!(mi.field.as_deref(), Some("final"));
        assert_eq!(mi.message, "nope.pdf: File not found");
    }
}
