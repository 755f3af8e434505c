pub mod store;
pub mod types;


pub use store::{SearchCache, cache_key};
pub use types::*;
