//! Gemini `generateContent` client used to structure research findings.

pub mod client;
pub mod types;

pub use client::{GeminiClient, GeminiError, Summarizer};
