//! # convo-recall
//!
//! A searchable, semantically indexed archive of conversation transcripts.
//!
//! Transcripts are mirrored into an archive, paired into user/assistant
//! exchanges, summarized hierarchically by a language model and embedded
//! into a SQLite store for nearest-neighbor search. A verifier detects drift
//! between the live transcripts, the archive and the index.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌────────────────────────┐   ┌──────────┐
//! │ Transcripts │──▶│ archive → parse →      │──▶│  SQLite  │
//! │  (*.jsonl)  │   │ summarize → embed      │   │ records+ │
//! └─────────────┘   └────────────────────────┘   │ vectors  │
//!                                                └────┬─────┘
//!                           ┌─────────────────────────┤
//!                           ▼                         ▼
//!                     ┌──────────┐             ┌─────────────┐
//!                     │  search  │             │verify/repair│
//!                     └──────────┘             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                  # create database
//! recall index-all             # archive, summarize, embed everything
//! recall search "sqlite locking"
//! recall verify                # report drift
//! recall repair                # fix what verify found
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`archive`] | Write-once transcript archive and summary paths |
//! | [`transcripts`] | Project/transcript discovery and file parsing |
//! | [`embedding`] | Embedding providers |
//! | [`summarizer`] | Summarization service clients |
//! | [`ingest`] | Indexing pipeline |
//! | [`verify`] | Drift detection and repair |
//! | [`search`] | Semantic search |
//! | [`sqlite_store`] | SQLite `ExchangeStore` |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod archive;
pub mod config;
pub mod db;
pub mod dump;
pub mod embedding;
pub mod http;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod recent;
pub mod search;
pub mod sqlite_store;
pub mod summarizer;
pub mod transcripts;
pub mod verify;
