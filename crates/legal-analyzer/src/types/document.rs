//! Document, status and storage-key types

use serde::{Deserialize, Serialize};

/// Media type for PDF uploads
pub const MEDIA_TYPE_PDF: &str = "application/pdf";
/// Media type for DOCX uploads
pub const MEDIA_TYPE_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// Media type for plain text uploads
pub const MEDIA_TYPE_TEXT: &str = "text/plain";
/// Generic binary media type, treated as "undeclared"
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// File formats the extractor knows how to read
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Plain text file
    Txt,
    /// Anything else, decoded as text on a best-effort basis
    Unknown,
}

impl FileType {
    /// Detect file type from extension (with or without the leading dot)
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "txt" | "text" => Self::Txt,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a declared media type, ignoring parameters
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        match essence.as_str() {
            MEDIA_TYPE_PDF => Self::Pdf,
            MEDIA_TYPE_DOCX => Self::Docx,
            MEDIA_TYPE_TEXT => Self::Txt,
            _ => Self::Unknown,
        }
    }

    /// Canonical extension including the leading dot
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::Pdf => Some(".pdf"),
            Self::Docx => Some(".docx"),
            Self::Txt => Some(".txt"),
            Self::Unknown => None,
        }
    }

    /// Canonical media type
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Pdf => MEDIA_TYPE_PDF,
            Self::Docx => MEDIA_TYPE_DOCX,
            Self::Txt => MEDIA_TYPE_TEXT,
            Self::Unknown => MEDIA_TYPE_OCTET_STREAM,
        }
    }

    /// Whether uploads of this type are accepted
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Pipeline status of a document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Raw blob stored, pipeline not started yet
    Uploaded,
    ExtractingText,
    Analyzing,
    /// Analysis persisted
    Processed,
    /// Extraction produced no text
    ErrorEmptyDocument,
    /// Any fatal fault during the run
    ErrorProcessingFailed,
}

impl DocumentStatus {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Processed | Self::ErrorEmptyDocument | Self::ErrorProcessingFailed
        )
    }

    /// Wire name, identical to the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::ExtractingText => "extracting_text",
            Self::Analyzing => "analyzing",
            Self::Processed => "processed",
            Self::ErrorEmptyDocument => "error_empty_document",
            Self::ErrorProcessingFailed => "error_processing_failed",
        }
    }

    /// Coarse phase reported to pollers
    pub fn phase(&self) -> DocumentPhase {
        match self {
            Self::Uploaded | Self::ExtractingText | Self::Analyzing => DocumentPhase::Processing,
            Self::Processed => DocumentPhase::Processed,
            Self::ErrorEmptyDocument | Self::ErrorProcessingFailed => DocumentPhase::Error,
        }
    }

    /// Human-readable reason for error states
    pub fn error_reason(&self) -> Option<&'static str> {
        match self {
            Self::ErrorEmptyDocument => Some("No text could be extracted from the document."),
            Self::ErrorProcessingFailed => Some("Document processing failed."),
            _ => None,
        }
    }

    /// Whether moving from `self` to `next` respects the state machine
    pub fn can_transition_to(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (s, _) if s.is_terminal() => false,
            (_, ErrorProcessingFailed) => true,
            (Uploaded, ExtractingText) => true,
            (ExtractingText, Analyzing) | (ExtractingText, ErrorEmptyDocument) => true,
            (Analyzing, Processed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a status poller sees
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentPhase {
    Processing,
    Processed,
    Error,
}

/// A stored blob: key plus media type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobRef {
    /// Storage key (e.g. `raw/<uuid>.pdf`)
    pub key: String,
    /// Media type used to pick an extraction strategy
    pub media_type: String,
}

impl BlobRef {
    pub fn new(key: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            media_type: media_type.into(),
        }
    }

    /// Lowercased extension of the key, including the dot
    pub fn extension(&self) -> Option<String> {
        key_extension(&self.key)
    }
}

/// Extension of a storage key's final segment, lowercased, including the dot
pub fn key_extension(key: &str) -> Option<String> {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rfind('.')
        .filter(|&i| i > 0)
        .map(|i| name[i..].to_lowercase())
}

/// Conceptual record of a document across raw and processed storage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// Opaque identifier (UUID at upload time)
    pub id: String,
    /// Original extension including the dot
    pub extension: String,
    pub status: DocumentStatus,
    pub raw_key: String,
    /// Present only once analysis completes
    pub processed_key: Option<String>,
}

impl DocumentRecord {
    /// New record for a freshly stored upload
    pub fn uploaded(id: impl Into<String>, extension: impl Into<String>, layout: &StorageLayout) -> Self {
        let id = id.into();
        let extension = extension.into();
        Self {
            raw_key: layout.raw_key(&id, &extension),
            id,
            extension,
            status: DocumentStatus::Uploaded,
            processed_key: None,
        }
    }
}

/// Key prefixes separating raw uploads, processed analyses and status entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageLayout {
    /// Raw namespace (default: "raw/")
    pub raw_prefix: String,
    /// Processed namespace (default: "processed/")
    pub processed_prefix: String,
    /// Status namespace for blob-backed status stores (default: "status/")
    pub status_prefix: String,
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self {
            raw_prefix: "raw/".to_string(),
            processed_prefix: "processed/".to_string(),
            status_prefix: "status/".to_string(),
        }
    }
}

impl StorageLayout {
    /// `raw/{id}{ext}`
    pub fn raw_key(&self, id: &str, extension: &str) -> String {
        format!("{}{}{}", self.raw_prefix, id, extension)
    }

    /// `raw/{id}`, the listing prefix for locating a raw blob
    pub fn raw_search_prefix(&self, id: &str) -> String {
        format!("{}{}", self.raw_prefix, id)
    }

    /// `processed/{id}.json`
    pub fn processed_key(&self, id: &str) -> String {
        format!("{}{}.json", self.processed_prefix, id)
    }

    /// `status/{id}.json`
    pub fn status_key(&self, id: &str) -> String {
        format!("{}{}.json", self.status_prefix, id)
    }
}
