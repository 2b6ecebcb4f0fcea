//! # gemkit - Gemini content generation client
//!
//! A small, pragmatic async client for the Gemini `generateContent` API,
//! with unary and streamed generation and per-request response metadata.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Lazy streaming via Server-Sent Events, one output unit per event
//! - Usage metadata and safety ratings correlated with each call by id
//! - Pluggable [`Transport`] (reqwest by default, scripted ones in tests)
//! - Model listing, token counting and batch embeddings
//!
//! ## Core Types
//!
//! - **[`Turn`]**: one conversation entry (text, media, both, or a function call/response)
//! - **[`GenerativeModel`]**: model name, turns, safety settings and generation config
//! - **[`GenAi`]**: the executor that sends requests and records their responses
//! - **[`GeneratedContent`]**: one output unit, tagged with its [`RequestId`]
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use gemkit::{GenAi, GenerationConfig, GenerativeModel, ModelVariant, Role, Turn};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GenAi::from_env()?;
//!
//!     let model = GenerativeModel::builder()
//!         .variant(ModelVariant::Gemini20Flash)
//!         .add_content(Turn::text(Role::User, "Write a haiku about Rust."))
//!         .generation_config(GenerationConfig::new().with_temperature(0.9))
//!         .build()?;
//!
//!     let mut stream = client.generate_stream(&model);
//!     while let Some(unit) = stream.next().await {
//!         print!("{}", unit?.text);
//!     }
//!
//!     println!("\n{:?}", client.usage_metadata(stream.id()));
//!     client.close();
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod correlator;
pub mod http;
pub mod model;
pub mod options;
pub mod sse;
pub mod stream;
pub mod transport;
pub mod wire;

// Re-exports for convenience
pub use client::{ClientError, GenAi, Result};
pub use correlator::ResponseCorrelator;
pub use http::ReqwestTransport;
pub use model::{GeneratedContent, GenerativeModel, MediaData, RequestId, Role, Turn};
pub use options::{
    GenerationConfig, HarmBlockThreshold, HarmCategory, ModelVariant, SafetySetting, TaskType,
};
pub use stream::GenerationStream;
pub use transport::{LineStream, Transport, TransportRequest};
pub use wire::{SafetyRating, UsageMetadata};
