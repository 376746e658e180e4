//! Vision-language backends.
//!
//! Both vendor APIs sit behind the [`VisionBackend`] trait and are selected by
//! [`BackendKind`](crate::types::BackendKind) through [`BackendFactory`].
//! Adding a backend means adding one variant and one module here; callers
//! only ever see the trait.

pub(crate) mod gemini;
pub(crate) mod openai;
pub(crate) mod provider;
pub mod tokens;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use provider::{resolve_env_var, ApiKeys, BackendFactory, LabelRequest, VisionBackend};
