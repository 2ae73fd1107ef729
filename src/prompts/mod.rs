//! Canonical prompt templates and payload shapes.

mod templates;

pub use templates::{initial_prompt, payload_shape, SYSTEM_PROMPT};
