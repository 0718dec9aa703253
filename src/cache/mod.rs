//! Cache tiers.
//!
//! The volatile tier lives as long as one page session. The persistent tier
//! is a named on-disk store owned by the background agent.

pub mod persistent;
pub mod volatile;

pub use persistent::{CacheStorage, PersistentCache};
pub use volatile::{CacheEntry, VolatileCache};
