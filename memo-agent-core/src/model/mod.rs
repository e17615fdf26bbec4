//! Language-model collaborators.

pub mod openai;
pub mod traits;
pub mod types;

pub use openai::OpenAIClient;
pub use traits::ModelProvider;
pub use types::{ModelError, ModelRequest, ModelResponse};
