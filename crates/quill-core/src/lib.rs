//! `quill-core` holds the data model shared between the Quill suggestion
//! engines and their host application layer.
//!
//! Nothing in this crate performs I/O. The types here describe chat
//! exchanges with a language model backend and the inputs of a single
//! inline-completion request.

mod chat;
mod completion;

pub use chat::{ChatMessage, ChatOptions, ChatRequest, ChatRole};
pub use completion::CompletionRequest;
