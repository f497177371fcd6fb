//! Best-effort plain text extraction for uploaded documents
//!
//! Every entry point returns a `String` and never fails: unreadable input
//! yields `""`. PDF extraction runs an ordered list of [`PdfStrategy`]
//! variants and keeps the first non-empty result.

use std::panic::{self, AssertUnwindSafe};

use crate::types::document::{key_extension, MEDIA_TYPE_OCTET_STREAM};
use crate::types::{BlobRef, FileType};

/// Separator between pages in extracted PDF text
const PAGE_SEPARATOR: &str = "\n\n";

/// PDF extraction strategies, tried in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfStrategy {
    /// Layout-aware text via pdf-extract, page by page
    LayoutPages,
    /// Per-page text via lopdf; pages that fail are skipped
    PageText,
}

impl PdfStrategy {
    /// Run the strategy; `None` when it produced nothing usable
    pub fn extract(&self, data: &[u8]) -> Option<String> {
        let text = match self {
            Self::LayoutPages => guarded("pdf-extract", || layout_pages(data))?,
            Self::PageText => guarded("lopdf", || page_text(data))?,
        };
        let text = text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::LayoutPages => "layout_pages",
            Self::PageText => "page_text",
        }
    }
}

/// Format-aware text extractor
#[derive(Debug, Clone)]
pub struct TextExtractor {
    pdf_strategies: Vec<PdfStrategy>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            pdf_strategies: vec![PdfStrategy::LayoutPages, PdfStrategy::PageText],
        }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom PDF fallback chain
    pub fn with_pdf_strategies(strategies: Vec<PdfStrategy>) -> Self {
        Self {
            pdf_strategies: strategies,
        }
    }

    /// Extract text from `data` declared as `media_type`
    pub fn extract(&self, data: &[u8], media_type: &str) -> String {
        self.extract_as(data, FileType::from_media_type(media_type))
    }

    /// Extract text for a stored blob.
    ///
    /// The declared media type wins; when it is missing or generic the key's
    /// extension decides.
    pub fn extract_blob(&self, data: &[u8], blob: &BlobRef) -> String {
        self.extract_as(data, resolve_file_type(blob))
    }

    /// Extract text treating `data` as `file_type`
    pub fn extract_as(&self, data: &[u8], file_type: FileType) -> String {
        let text = match file_type {
            FileType::Pdf => self.extract_pdf(data),
            FileType::Docx => guarded("docx-rs", || docx_paragraphs(data)).unwrap_or_default(),
            FileType::Txt | FileType::Unknown => decode_text(data),
        };
        text.trim().to_string()
    }

    fn extract_pdf(&self, data: &[u8]) -> String {
        for strategy in &self.pdf_strategies {
            match strategy.extract(data) {
                Some(text) => {
                    tracing::debug!(
                        "PDF strategy {} extracted {} chars",
                        strategy.name(),
                        text.len()
                    );
                    return text;
                }
                None => {
                    tracing::debug!("PDF strategy {} produced no text", strategy.name());
                }
            }
        }
        tracing::warn!("All PDF strategies failed ({} bytes)", data.len());
        String::new()
    }
}

/// Pick the file type for a blob: declared media type, then extension
pub fn resolve_file_type(blob: &BlobRef) -> FileType {
    let declared = blob.media_type.trim();
    if !declared.is_empty() && !declared.eq_ignore_ascii_case(MEDIA_TYPE_OCTET_STREAM) {
        return FileType::from_media_type(declared);
    }
    key_extension(&blob.key)
        .map(|ext| FileType::from_extension(&ext))
        .unwrap_or(FileType::Unknown)
}

/// Run a parser, turning panics and errors into `None`
fn guarded<F>(parser: &str, f: F) -> Option<String>
where
    F: FnOnce() -> Option<String>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("{} panicked while parsing document", parser);
            None
        }
    }
}

/// Layout-aware extraction: one string per page from pdf-extract
fn layout_pages(data: &[u8]) -> Option<String> {
    let pages = match pdf_extract::extract_text_from_mem_by_pages(data) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::debug!("pdf-extract failed: {}", e);
            return None;
        }
    };

    Some(join_pages(pages.iter().map(|p| normalize_pdf_text(p))))
}

/// Simpler extraction: lopdf text per page, content-stream scan as last resort
fn page_text(data: &[u8]) -> Option<String> {
    let doc = match lopdf::Document::load_mem(data) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("lopdf failed to load PDF: {}", e);
            return None;
        }
    };

    let mut pages = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        let text = match doc.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("lopdf could not extract page {}: {}", page_num, e);
                match doc.get_page_content(page_id) {
                    Ok(content) => text_from_content_stream(&content),
                    Err(_) => continue,
                }
            }
        };
        pages.push(normalize_pdf_text(&text));
    }

    Some(join_pages(pages.into_iter()))
}

/// Trim each page, drop empty ones, join with a blank line
fn join_pages<I>(pages: I) -> String
where
    I: Iterator<Item = String>,
{
    pages
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}

/// Strip null bytes and expand ligatures that PDF fonts commonly emit
fn normalize_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{00A0}', " ")
}

/// Pull string operands of Tj/TJ operators out of BT..ET blocks
fn text_from_content_stream(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let line = line.trim();

        if line == "BT" {
            in_text_block = true;
            continue;
        }

        if line == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push(' ');
                current_text.clear();
            }
            continue;
        }

        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                if start < end {
                    let decoded = line[start + 1..end]
                        .replace("\\n", "\n")
                        .replace("\\(", "(")
                        .replace("\\)", ")")
                        .replace("\\\\", "\\");
                    current_text.push_str(&decoded);
                }
            }
        }
    }

    text
}

/// Non-empty paragraph texts in document order, newline separated
fn docx_paragraphs(data: &[u8]) -> Option<String> {
    let doc = match docx_rs::read_docx(data) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("docx-rs failed to read document: {}", e);
            return None;
        }
    };

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            let mut text = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        match child {
                            docx_rs::RunChild::Text(t) => text.push_str(&t.text),
                            docx_rs::RunChild::Tab(_) => text.push('\t'),
                            _ => {}
                        }
                    }
                }
            }
            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }

    Some(paragraphs.join("\n"))
}

/// UTF-8 decode, substituting invalid sequences
fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::document::{MEDIA_TYPE_DOCX, MEDIA_TYPE_PDF};

    /// Minimal text PDF built with lopdf, one page per entry
    fn make_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::{dictionary, Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = format!("BT\n/F1 12 Tf\n100 700 Td\n({}) Tj\nET\n", text);
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_text_pdf_is_extracted() {
        let pdf = make_pdf(&["Termination clause", "Notice period"]);
        let text = TextExtractor::new().extract(&pdf, MEDIA_TYPE_PDF);
        assert!(text.contains("Termination"), "got: {:?}", text);
        assert!(text.contains("Notice"), "got: {:?}", text);
    }

    #[test]
    fn test_page_text_strategy_alone() {
        let pdf = make_pdf(&["Indemnity"]);
        let extractor = TextExtractor::with_pdf_strategies(vec![PdfStrategy::PageText]);
        assert!(extractor.extract(&pdf, MEDIA_TYPE_PDF).contains("Indemnity"));
    }

    #[test]
    fn test_plain_text_is_trimmed() {
        let extractor = TextExtractor::new();
        let text = extractor.extract(b"  \n Employer may terminate at will.\n\n", "text/plain");
        assert_eq!(text, "Employer may terminate at will.");
    }

    #[test]
    fn test_invalid_utf8_is_substituted() {
        let extractor = TextExtractor::new();
        let text = extractor.extract(&[b'a', 0xff, 0xfe, b'b'], "text/plain");
        assert!(text.starts_with('a'));
        assert!(text.ends_with('b'));
    }

    #[test]
    fn test_unknown_type_decodes_as_text() {
        let extractor = TextExtractor::new();
        assert_eq!(extractor.extract(b"clause 1", "application/x-unknown"), "clause 1");
    }

    #[test]
    fn test_corrupted_pdf_returns_empty() {
        let extractor = TextExtractor::new();
        assert_eq!(extractor.extract(b"%PDF-1.4 this is not a pdf", MEDIA_TYPE_PDF), "");
        assert_eq!(extractor.extract(b"", MEDIA_TYPE_PDF), "");
        assert_eq!(extractor.extract(&[0u8; 64], MEDIA_TYPE_PDF), "");
    }

    fn make_docx(paragraphs: &[&str]) -> Vec<u8> {
        use docx_rs::{Docx, Paragraph, Run};

        let docx = paragraphs.iter().fold(Docx::new(), |docx, text| {
            let paragraph = if text.is_empty() {
                Paragraph::new()
            } else {
                Paragraph::new().add_run(Run::new().add_text(*text))
            };
            docx.add_paragraph(paragraph)
        });

        let mut cursor = std::io::Cursor::new(Vec::new());
        docx.build().pack(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_docx_paragraphs_in_order() {
        let docx = make_docx(&["First clause", "", "Second clause"]);
        let text = TextExtractor::new().extract(&docx, MEDIA_TYPE_DOCX);
        assert_eq!(text, "First clause\nSecond clause");
    }

    #[test]
    fn test_corrupted_docx_returns_empty() {
        let extractor = TextExtractor::new();
        assert_eq!(extractor.extract(b"PK\x03\x04 truncated zip", MEDIA_TYPE_DOCX), "");
        assert_eq!(extractor.extract(b"plain bytes", MEDIA_TYPE_DOCX), "");
    }

    #[test]
    fn test_empty_strategy_chain_returns_empty() {
        let extractor = TextExtractor::with_pdf_strategies(Vec::new());
        assert_eq!(extractor.extract(b"anything", MEDIA_TYPE_PDF), "");
    }

    #[test]
    fn test_resolve_prefers_declared_type() {
        let blob = BlobRef::new("raw/abc.txt", MEDIA_TYPE_PDF);
        assert_eq!(resolve_file_type(&blob), FileType::Pdf);
    }

    #[test]
    fn test_resolve_falls_back_to_extension() {
        let blob = BlobRef::new("raw/abc.docx", MEDIA_TYPE_OCTET_STREAM);
        assert_eq!(resolve_file_type(&blob), FileType::Docx);

        let blob = BlobRef::new("raw/abc", "");
        assert_eq!(resolve_file_type(&blob), FileType::Unknown);
    }

    #[test]
    fn test_join_pages_skips_blank_pages() {
        let pages = vec![" one ".to_string(), "   ".to_string(), "two".to_string()];
        assert_eq!(join_pages(pages.into_iter()), "one\n\ntwo");
    }

    #[test]
    fn test_content_stream_scan() {
        let stream = b"BT\n/F1 12 Tf\n(Term \\(a\\)) Tj\nET\nBT\n(Notice) Tj\nET\n";
        assert_eq!(text_from_content_stream(stream).trim(), "Term (a) Notice");
    }

    #[test]
    fn test_normalize_ligatures() {
        assert_eq!(normalize_pdf_text("\u{FB01}nal\0"), "final");
    }

    #[test]
    fn test_guarded_catches_panics() {
        let result = guarded("test", || panic!("boom"));
        assert!(result.is_none());
    }
}
