pub mod export;
pub mod import;

pub use export::{CatalogDocument, Exporter, StatementSnapshot};
pub use import::{ImportError, ImportResult, Importer};
