//! Orchestration glue for an externally-hosted image generation engine.
//!
//! Translates the user-facing request surface (prompt, chaos, weird
//! mode, aspect ratio, guidance, image count) into patches against a
//! fixed ComfyUI workflow template, submits the patched document through
//! a [`comfy_session::Session`], and finalizes produced files into the
//! requested output format.

pub mod config;
pub mod images;
pub mod params;
pub mod predictor;
pub mod slots;
pub mod workspace;

pub use config::Config;
pub use images::OutputFormat;
pub use params::{AspectRatio, GenerationParams};
pub use predictor::Predictor;
pub use slots::{WorkflowPatch, WorkflowSlots};
pub use workspace::Workspace;
