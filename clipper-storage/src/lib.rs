//! Clipper Storage - Cache Store Trait and Implementations
//!
//! Defines the key-value store abstraction the invalidation engine deletes
//! from, an in-memory implementation and (with the `redis` feature) a Redis
//! implementation.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;
pub mod traits;

pub use memory::InMemoryCacheStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisCacheStore;
pub use traits::CacheStore;
