//! LLM provider abstraction: multimodal chat and batched embeddings.

pub mod error;
pub mod http;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, MessagePart, Role};
