pub mod client;

pub use client::{ChatGptError, ChatMessage, OpenAiModelClient};
