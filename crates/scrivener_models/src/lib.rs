//! LLM backends for Scrivener.
//!
//! - [`OpenAiClient`] talks to any OpenAI-compatible chat completions API and
//!   reports 429 rejections as throttling errors.
//! - [`MockClient`] returns canned complaints after an artificial delay.
//! - [`GatedGenerator`] runs any backend through a
//!   [`CallGate`](scrivener_rate_limit::CallGate).
//! - [`build_generator`] picks a backend from the `[llm]` settings.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod factory;
mod gated;
mod mock;
mod openai;

pub use factory::{build_generator, provider_from_name};
pub use gated::GatedGenerator;
pub use mock::{MOCK_MODEL, MockClient};
pub use openai::{API_KEY_ENV, OpenAiClient};
