//! # convo-recall core
//!
//! Shared logic for convo-recall: exchange models, the transcript parser
//! state machine, hierarchical summarization control, the store and
//! service traits, and the search ranking function.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network
//! clients. The application crate supplies concrete stores, embedding
//! providers, and summarization services through the traits defined here.

pub mod embedding;
pub mod models;
pub mod parser;
pub mod search;
pub mod store;
pub mod summarize;
