//! PDF manipulation module

pub mod create;
pub mod merge;
pub mod metadata;
pub mod stamp;
pub mod xobject;

// Re-export commonly used items
pub use create::create_blank_pdf;
pub use merge::{merge_pdfs, MergeOptions};
pub use metadata::{count_pages, extract_metadata, PdfMetadata};
pub use stamp::{stamp_page_numbers, StampOptions};
