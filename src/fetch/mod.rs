//! Document retrieval
//!
//! - [`engine`] - the HTTP fetch engine seam ([`HttpFetcher`]) and its reqwest implementation
//! - [`orchestrator`] - per-record document fetching under the shared throttle

mod engine;
mod orchestrator;

pub use engine::{FetchResponse, HttpFetcher, ReqwestFetcher};
pub use orchestrator::FetchOrchestrator;
