pub mod model;
pub mod repository;

pub use model::FileRecord;
pub use repository::{FileCatalog, SqliteFileCatalog, UpsertOutcome};
