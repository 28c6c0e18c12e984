//! The concrete Ollama `LlmTransport` (spec.md §6), split into the HTTP/NDJSON
//! client and the pure chunk-to-event parser.

mod client;
mod parser;

pub use client::OllamaTransport;
