//! Requirement text to architecture explanation and rendered diagram.
//!
//! A requirement goes to an OpenAI-compatible inference endpoint, the answer
//! is split into an explanation and a diagram JSON section, the JSON is
//! repaired and decoded into a [`diagram::Graph`], the graph is validated and
//! turned into Graphviz DOT, and the DOT is rendered by a Kroki service.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | [`pipeline::Sketcher`] wiring every step together |
//! | [`llm`] | Completion client, prompts and the HTTP transport |
//! | [`diagram`] | Graph model, section split, JSON repair, parse, validation, DOT |
//! | [`render`] | Render client and the Kroki transport |
//! | [`retry`] | Classified retry with exponential backoff |
//! | [`cache`] | Bounded LRU cache with counters |
//! | [`metrics`] | Parse and repair-strategy counters |
//! | [`config`] | Settings from environment variables |
//! | [`error`] | [`error::SketchError`] and error codes |
//! | [`http`] | Per-attempt HTTP failure type and its classification |

pub mod cache;
pub mod config;
pub mod diagram;
pub mod error;
pub mod http;
pub mod llm;
pub mod metrics;
pub mod pipeline;
pub mod render;
pub mod retry;
