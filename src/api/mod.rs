pub mod backend;
pub mod client;
pub mod models;

pub use backend::MatchBackend;
pub use client::{ApiClient, ApiError};
