//! Remote LLM provider implementations.
//!
//! These providers require API keys.
//!
//! # Providers
//!
//! - **Groq** - hosted open models (Gemma, Llama, Mixtral)

pub mod groq;

pub use groq::GroqClient;
