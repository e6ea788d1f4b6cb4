//! # ragbot core
//!
//! Tokio-free logic for the ragbot retrieval chatbot: data models, bounded
//! context assembly, the summary cache and vector store abstractions, and
//! the service traits the orchestrator is wired against.
//!
//! Nothing here performs network or file I/O; backends live in the `ragbot`
//! app crate.

pub mod cache;
pub mod context;
pub mod embedding;
pub mod models;
pub mod services;
pub mod store;
