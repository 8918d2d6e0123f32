//! Integration tests for Odin
//!
//! Drive the torrent manager, subtitle pipeline and HTTP router together
//! against the simulated engine and the mock subtitle provider.

#[path = "integration/fixtures.rs"]
mod fixtures;

#[path = "integration/http_api.rs"]
mod http_api;
#[path = "integration/streaming_ranges.rs"]
mod streaming_ranges;
#[path = "integration/subtitle_pipeline.rs"]
mod subtitle_pipeline;
#[path = "integration/torrent_workflow.rs"]
mod torrent_workflow;
