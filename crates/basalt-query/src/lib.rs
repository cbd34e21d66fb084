mod error;
pub mod matcher;
pub mod path;
mod sort;
pub mod value;

pub use error::QueryError;
pub use matcher::{match_position, matches};
pub use sort::{SortDirection, SortKey, SortSpec};
