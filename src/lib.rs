//! # ragbox
//!
//! A local-first document ingestion and similarity retrieval backend for
//! retrieval-augmented generation.
//!
//! Files of many formats go in; overlapping text chunks with embeddings come
//! out, grouped into named collections that can be searched by similarity or
//! asked for the most recently ingested document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌─────────────┐   ┌──────────┐
//! │ Uploads  │──▶│ Extractor │──▶│ Chunker │──▶│ VectorStore │──▶│  SQLite  │
//! │ sandbox  │   │ (engines) │   │         │   │ (+embedder) │   │  index   │
//! └──────────┘   └───────────┘   └─────────┘   └──────┬──────┘   └──────────┘
//!                                                     │
//!                                               ┌─────▼──────┐
//!                                               │QueryService│
//!                                               └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragbox init
//! ragbox ingest report.pdf notes.md --collection work
//! ragbox query "quarterly revenue" --collection work -k 3
//! ragbox recent --collection work
//! ragbox diag
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format text extraction with engine fallback |
//! | [`chunk`] | Text cleaning and overlapping chunking |
//! | [`embedding`] | Embedding provider abstraction and selection |
//! | [`store`] | Index backends (SQLite, in-memory) |
//! | [`vectorstore`] | Collections: add, query, recent |
//! | [`uploads`] | Upload sandbox |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query service |
//! | [`context`] | Process-scoped wiring |
//! | [`commands`] | CLI command implementations |

pub mod chunk;
pub mod commands;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod query;
pub mod store;
pub mod uploads;
pub mod vectorstore;
