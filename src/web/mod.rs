pub mod api;
pub mod responses;

pub use api::{ApiServer, CompareRequest, PredictRequest};
