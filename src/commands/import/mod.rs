mod error_log;
mod importer;
mod progress;
mod run;
mod store;

pub use error_log::{read_error_report, write_error_report};
pub use importer::{HierarchicalImporter, is_constraint_violation};
pub use progress::{CancelToken, ProgressSink, ProgressUpdate, TracingProgressSink};
pub use run::run;
pub use store::{
    ArticleRow, ChapterRow, ClauseRow, DB_SCHEMA_VERSION, EditionRow, RegulationRow, SqliteStore,
    StorePort, Upsert,
};
