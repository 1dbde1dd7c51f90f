// DeepSeek exposes an OpenAI-compatible chat-completion surface, so the
// request/response types come straight from async-openai.
pub use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest as ChatCompletionRequest,
    CreateChatCompletionRequestArgs as ChatCompletionRequestArgs,
    CreateChatCompletionResponse as ChatCompletionResponse, ResponseFormat,
};
