//! # ragbot
//!
//! A retrieval-augmented chatbot over a small corpus of PDF, DOCX, CSV,
//! image, and video files.
//!
//! Each file is extracted into one text unit (OCR and captions for images,
//! per-frame OCR and captions for videos), embedded, and stored in SQLite.
//! A query retrieves the nearest units, builds a bounded context, optionally
//! adds web search snippets, and asks a local Ollama model for a summary.
//! Answers are cached per `(user, scope, query, web)`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ Extractors  │──▶│    Index    │──▶│   SQLite    │
//! │ doc + media │   │ embed+store │   │ vec + cache │
//! └─────────────┘   └──────┬──────┘   └─────────────┘
//!                          │
//!                          ▼
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ HTTP + CLI  │──▶│   Chatbot   │──▶│ web search, │
//! │             │   │             │   │ Ollama LLM  │
//! └─────────────┘   └─────────────┘   └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] / [`migrate`] | Database connection and schema |
//! | [`extract`] | Per-format text extraction |
//! | [`media`] | OCR, captioning, frame sampling |
//! | [`embedding`] | Embedding backends |
//! | [`index`] | Embed + vector store facade |
//! | [`sqlite_store`] / [`sqlite_cache`] | SQLite vector store and summary cache |
//! | [`ingest`] | Bounded parallel bulk indexing |
//! | [`generator`] | Ollama streaming client |
//! | [`web_search`] | Google Custom Search client with quota |
//! | [`chatbot`] | Query orchestration |
//! | [`uploads`] | Upload handling and registry |
//! | [`server`] | HTTP API |
//! | [`app`] | Startup wiring |

pub mod app;
pub mod chatbot;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generator;
pub mod index;
pub mod ingest;
pub mod logging;
pub mod media;
pub mod migrate;
pub mod server;
pub mod sqlite_cache;
pub mod sqlite_store;
#[doc(hidden)]
pub mod testing;
pub mod uploads;
pub mod web_search;
