pub mod collections;
pub mod parse;
pub mod search;
pub mod stores;

pub use collections::run_collections;
pub use parse::run_parse;
pub use search::run_search;
