//! Serves loan sales forecasts from a registry of pre-trained models.
//!
//! Startup loads the registry once; each request resolves a model by name,
//! loads its artifact, dispatches on the model family and wraps the point
//! prediction in a scenario band with same-quarter history.

pub mod config;
pub mod data;
pub mod error;
pub mod format;
pub mod metrics;
pub mod ml;
pub mod registry;
pub mod web;
