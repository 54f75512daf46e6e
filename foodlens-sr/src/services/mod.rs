//! Lookup clients for the resolution pipeline
//!
//! Concrete implementations of the capability traits in `types`:
//! barcode registry and text search (OpenFoodFacts), OCR text extraction
//! (Tesseract subprocess), and the AI vision fallback (Gemini).

pub mod ocr;
pub mod registry;
pub mod search;
pub mod vision;

pub use ocr::{OcrExtraction, OcrExtractor, TesseractCli};
pub use registry::OpenFoodFactsRegistry;
pub use search::OpenFoodFactsSearch;
pub use vision::GeminiVisionClient;
