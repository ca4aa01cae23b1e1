//! Generation requests: the assembly pipeline and its HTTP surface.

pub mod handlers;
pub mod models;
pub mod pipeline;

pub use pipeline::{AssemblyPipeline, GenerationOutcome, PipelineError, SIGNED_URL_TTL_SECS};
