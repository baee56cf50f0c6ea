//! Inference server access: address handling, HTTP adapter and prompts.

pub mod http_client;
pub mod ollama;
pub mod prompts;
pub mod server;

pub use ollama::{InferenceClient, OllamaClient, DEFAULT_MODEL, DEFAULT_PAYLOAD_WARN_BYTES};
pub use prompts::{build_describe_prompt, DEFAULT_LANGUAGE, DESCRIBE_IMAGE_PROMPT};
pub use server::{normalize_server_address, ServerAddress, DEFAULT_SERVER};
