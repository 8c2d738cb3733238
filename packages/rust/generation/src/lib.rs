//! Generation Client contract and implementations.
//!
//! This crate provides:
//! - [`GenerationClient`] — the narrow contract for calling a generative-text service
//! - [`Shape`] — structured-output descriptors rendered to JSON Schema and checked on return
//! - [`OpenRouterClient`] — an OpenAI-compatible HTTP implementation
//! - [`ScriptedGenerator`] — a replaying client for tests and offline runs

pub mod client;
pub mod mock;
pub mod openrouter;
pub mod shape;

pub use client::{GenerationClient, Generated, generate_structured, parse_json_text};
pub use mock::ScriptedGenerator;
pub use openrouter::OpenRouterClient;
pub use shape::{Field, Shape, ShapeMismatch};
