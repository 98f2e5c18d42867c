pub mod banner;
pub mod cache;
pub mod errors;
pub mod logger;
pub mod types;

pub use cache::{MemoryCache, TtlCache};
pub use errors::*;
pub use types::*;
