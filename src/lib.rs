//! # QueryBridge
//!
//! Chat with your PDFs: per-user vector namespaces, retrieval-augmented
//! queries, and a Google OAuth login flow.
//!
//! QueryBridge ingests PDF and text documents into per-user namespaces in a
//! SQLite-backed vector store, answers questions over them by embedding the
//! query and prompting an LLM with the nearest chunks, and serves a small
//! web front-end split across two servers: an auth server that owns the
//! OAuth flow and session registry, and an API server that owns ingest,
//! query, and the chat page.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌─────────────┐
//! │ Uploads  │──▶│   Pipeline    │──▶│   SQLite    │
//! │ PDF/TXT  │   │ Chunk + Embed │   │  (vectors)  │
//! └──────────┘   └───────────────┘   └──────┬──────┘
//!                                           │
//!                      ┌────────────────────┤
//!                      ▼                    ▼
//!                 ┌─────────┐        ┌───────────┐
//!                 │   CLI   │        │ HTTP API  │
//!                 │  (qb)   │        │ + chat UI │
//!                 └─────────┘        └───────────┘
//! ```
//!
//! Every vector row carries a namespace derived from its owner's email;
//! retrieval and deletion are always scoped to one namespace, so users
//! never see each other's documents.
//!
//! ## Quick Start
//!
//! ```bash
//! qb init                                  # create database
//! qb ingest alice@example.com report.pdf   # ingest a PDF for a user
//! qb query alice@example.com "what were the Q3 numbers?"
//! qb stats alice@example.com
//! qb serve auth                            # OAuth login server
//! qb serve api                             # chat + ingest + query API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Environment-driven configuration |
//! | [`models`] | Core data types |
//! | [`namespace`] | Email → namespace derivation |
//! | [`extract`] | PDF and plain-text extraction |
//! | [`chunk`] | Whitespace-token chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite vector store |
//! | [`ingest`] | Batch ingestion pipeline |
//! | [`query`] | Retrieval-augmented query pipeline |
//! | [`llm`] | Answer generation (Gemini, Ollama) |
//! | [`session`] | Session files and login registry |
//! | [`server_api`] | Ingest/query/chat HTTP server |
//! | [`server_auth`] | OAuth login HTTP server |
//! | [`stats`] | Namespace statistics and deletion |
//! | [`ui`] | Served HTML pages |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema setup |

pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod namespace;
pub mod query;
pub mod server_api;
pub mod server_auth;
pub mod session;
pub mod stats;
pub mod store;
pub mod ui;
