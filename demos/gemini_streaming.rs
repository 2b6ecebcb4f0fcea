//! Streaming Gemini example, followed by the call's usage metadata and
//! safety ratings.
//!
//! Run with:
//! ```bash
//! export GEMINI_API_KEY="your-api-key"
//! RUST_LOG=gemkit=debug cargo run --example gemini_streaming
//! ```

use futures::StreamExt;
use gemkit::options::{HttpTransport, TransportOptions};
use gemkit::{
    GenAi, GenerationConfig, GenerativeModel, HarmBlockThreshold, HarmCategory, ModelVariant,
    Role, SafetySetting, Turn,
};
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let transport_options =
        TransportOptions::new(HttpTransport::from_env()?).with_timeout(Duration::from_secs(60));
    let client = GenAi::new(transport_options)?;

    let model = GenerativeModel::builder()
        .variant(ModelVariant::Gemini25Flash)
        .add_content(Turn::text(Role::User, "Write a haiku about Rust programming."))
        .add_safety_setting(SafetySetting::of(
            HarmCategory::Harassment,
            HarmBlockThreshold::BlockOnlyHigh,
        ))
        .generation_config(
            GenerationConfig::new()
                .with_temperature(0.9)
                .with_top_p(0.95)
                .with_max_output_tokens(1024),
        )
        .build()?;

    println!("Streaming response from Gemini...\n");

    let mut stream = client.generate_stream(&model);
    while let Some(unit) = stream.next().await {
        match unit {
            Ok(unit) => {
                print!("{}", unit.text);
                std::io::stdout().flush()?;
            }
            Err(e) => {
                eprintln!("\nError in stream: {}", e);
                return Err(e.into());
            }
        }
    }

    let id = stream.id();
    println!("\n\n=== Usage Information ===");
    if let Some(usage) = client.usage_metadata(id) {
        println!("Prompt tokens: {}", usage.prompt_token_count);
        println!("Candidate tokens: {}", usage.candidates_token_count);
        println!("Total tokens: {}", usage.total_token_count);
    }

    println!("\n=== Safety Ratings ===");
    for rating in client.safety_ratings(id) {
        println!("{}: {}", rating.category, rating.probability);
    }

    client.close();
    Ok(())
}
