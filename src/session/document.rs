//! Document store
//!
//! Holds the single document selected for the current session. Selecting a new
//! document replaces the previous one outright; documents are never mutated.

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// File extensions accepted for analysis
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "pdf", "jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "svg", "ico", "heic",
    "heif", "raw", "cr2", "nef", "arw", "dng", "orf", "rw2", "pef", "srw",
];

/// Declared media type of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MediaType {
    Pdf,
    Image { mime: String },
}

impl MediaType {
    /// Parse a declared MIME type, rejecting anything that is not an image or PDF
    pub fn parse(media_type: &str) -> SessionResult<Self> {
        // Drop parameters such as "; charset=binary"
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf),
            m if m.len() > "image/".len() && m.starts_with("image/") => Ok(Self::Image {
                mime: essence.clone(),
            }),
            _ => Err(SessionError::UnsupportedMediaType {
                media_type: media_type.trim().to_string(),
            }),
        }
    }

    /// Guess a MIME type from a file name
    ///
    /// Camera raw formats unknown to `mime_guess` map to `image/x-<ext>` so they
    /// still pass [`MediaType::parse`].
    pub fn guess_from_file_name(name: &str) -> String {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let Some(ext) = ext else {
            return "application/octet-stream".to_string();
        };

        if ext == "pdf" {
            return "application/pdf".to_string();
        }

        let guessed = mime_guess::from_ext(&ext).first();
        match guessed {
            Some(m) if m.type_() == mime_guess::mime::IMAGE => m.essence_str().to_string(),
            _ if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => format!("image/x-{}", ext),
            Some(m) => m.essence_str().to_string(),
            None => "application/octet-stream".to_string(),
        }
    }

    pub fn as_mime(&self) -> &str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Image { mime } => mime,
        }
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_mime())
    }
}

/// A selected document: raw payload plus its declared type and display name
#[derive(Clone, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub media_type: MediaType,
    pub selected_at: DateTime<Utc>,
    payload: Vec<u8>,
}

impl Document {
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("bytes", &self.payload.len())
            .finish()
    }
}

/// Holds the currently selected document for one session
#[derive(Debug, Default)]
pub struct DocumentStore {
    current: Option<Arc<Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current document
    ///
    /// On error the previously selected document is kept.
    pub fn select(
        &mut self,
        payload: Vec<u8>,
        media_type: &str,
        name: &str,
    ) -> SessionResult<Arc<Document>> {
        let media_type = MediaType::parse(media_type)?;

        if payload.is_empty() {
            return Err(SessionError::EmptyDocument {
                name: name.to_string(),
            });
        }

        let document = Arc::new(Document {
            id: Uuid::new_v4(),
            name: name.to_string(),
            media_type,
            selected_at: Utc::now(),
            payload,
        });

        tracing::info!(
            document = %document.id,
            name = %document.name,
            media_type = %document.media_type,
            bytes = document.len(),
            "Document selected"
        );

        self.current = Some(Arc::clone(&document));
        Ok(document)
    }

    pub fn current(&self) -> Option<Arc<Document>> {
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// A document file read from disk, ready to be selected
#[derive(Debug)]
pub struct DocumentFile {
    pub name: String,
    pub media_type: String,
    pub payload: Vec<u8>,
}

/// Read a file and guess its media type from the file name
pub async fn read_document_file(path: &Path) -> std::io::Result<DocumentFile> {
    let payload = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = MediaType::guess_from_file_name(&name);

    tracing::debug!(path = %path.display(), bytes = payload.len(), %media_type, "Read document file");

    Ok(DocumentFile {
        name,
        media_type,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_media_type() {
        assert_eq!(MediaType::parse("application/pdf").unwrap(), MediaType::Pdf);
        assert_eq!(
            MediaType::parse("Image/PNG").unwrap(),
            MediaType::Image { mime: "image/png".into() }
        );
        assert_eq!(
            MediaType::parse("image/jpeg; q=0.9").unwrap().as_mime(),
            "image/jpeg"
        );
        assert!(MediaType::parse("application/pdf").unwrap().is_pdf());
    }

    #[test]
    fn test_parse_rejects_non_documents() {
        for media_type in ["text/plain", "application/zip", "image/", "", "video/mp4"] {
            let err = MediaType::parse(media_type).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedMediaType, "{}", media_type);
        }
    }

    #[test]
    fn test_guess_from_file_name() {
        assert_eq!(MediaType::guess_from_file_name("rx.PDF"), "application/pdf");
        assert_eq!(MediaType::guess_from_file_name("label.jpg"), "image/jpeg");
        assert_eq!(MediaType::guess_from_file_name("scan.png"), "image/png");
        assert_eq!(MediaType::guess_from_file_name("notes"), "application/octet-stream");
        assert!(MediaType::guess_from_file_name("photo.cr2").starts_with("image/"));
        assert!(MediaType::parse(&MediaType::guess_from_file_name("photo.nef")).is_ok());
        assert!(MediaType::parse(&MediaType::guess_from_file_name("notes.txt")).is_err());
    }

    #[test]
    fn test_select_replaces_document() {
        let mut store = DocumentStore::new();
        assert!(store.current().is_none());

        let first = store.select(vec![1, 2, 3], "image/png", "first.png").unwrap();
        let second = store.select(vec![4, 5], "application/pdf", "second.pdf").unwrap();

        let current = store.current().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(current.id, second.id);
        assert_eq!(current.payload(), &[4, 5]);
        assert_eq!(current.name, "second.pdf");
    }

    #[test]
    fn test_rejected_selection_keeps_previous_document() {
        let mut store = DocumentStore::new();
        let kept = store.select(vec![1], "image/png", "kept.png").unwrap();

        let err = store.select(vec![1], "text/plain", "notes.txt").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMediaType);

        let err = store.select(Vec::new(), "image/png", "empty.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyDocument);

        assert_eq!(store.current().unwrap().id, kept.id);
    }

    #[test]
    fn test_clear_discards_document() {
        let mut store = DocumentStore::new();
        store.select(vec![1], "image/png", "a.png").unwrap();
        store.clear();
        assert!(store.current().is_none());
    }

    #[test]
    fn test_debug_omits_payload() {
        let mut store = DocumentStore::new();
        let doc = store.select(vec![0xAB; 64], "image/png", "a.png").unwrap();
        let rendered = format!("{:?}", doc);
        assert!(rendered.contains("bytes: 64"));
        assert!(!rendered.contains("payload"));
    }

    #[tokio::test]
    async fn test_read_document_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prescription.pdf");
        std::fs::write(&path, b"%PDF-1.4 fake").unwrap();

        let file = read_document_file(&path).await.unwrap();
        assert_eq!(file.name, "prescription.pdf");
        assert_eq!(file.media_type, "application/pdf");
        assert_eq!(file.payload, b"%PDF-1.4 fake");
    }
}
