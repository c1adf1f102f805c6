pub mod catalog;
pub mod slot;

pub use catalog::{by_r2_desc, Family, Metrics, ModelEntry, Registry, ERROR_SENTINEL, R2_SENTINEL};
pub use slot::RegistrySlot;
