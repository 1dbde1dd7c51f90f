pub mod client;
pub mod types;

pub use client::DeepSeekProvider;
pub use types::{ChatCompletionRequest, ChatCompletionResponse};
