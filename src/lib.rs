//! Docqa - Document Question Answering
//!
//! Ingests plain-text documents, chunks them hierarchically or along their
//! structure, indexes the chunks for hybrid lexical and vector retrieval,
//! and answers questions through a cascading pipeline: response cache,
//! generation grounded in retrieved passages, full-corpus fallback, and a
//! terminal refusal when nothing applies.

pub mod cache;
pub mod chunker;
pub mod classify;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod generate;
pub mod retrieval;
pub mod store;
pub mod vector;

pub use error::{DocqaError, Result};
