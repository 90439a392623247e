//! Generic paged, filterable admin table.
//!
//! [`TableState`] holds the page/filter/row state and every transition as plain
//! methods. [`PagedTable`] runs one state per tokio task, debounces filter
//! changes and publishes [`TableView`] snapshots for whatever renders the table.

mod driver;
mod source;
mod state;

use serde::de::DeserializeOwned;

pub use driver::{PagedTable, TableOptions};
pub use source::{HttpPageSource, PageSource};
pub use state::{Notice, NoticeKind, PageRequest, Phase, TableState, TableView};

/// A row the table can show and delete.
pub trait TableRow: DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> i64;
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("malformed page response: {0}")]
    Decode(#[from] serde_json::Error),
}
