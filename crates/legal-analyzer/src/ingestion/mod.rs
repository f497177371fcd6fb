//! Document text extraction

mod extractor;

pub use extractor::{resolve_file_type, PdfStrategy, TextExtractor};
