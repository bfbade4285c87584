// Service exports
pub mod cache;
pub mod matching;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager};
pub use matching::MatchService;
pub use postgres::PostgresClient;
pub use store::{MatchStore, MemoryStore, StoreError};
