//! Core domain models for kb-rag.
//!
//! This module contains the data that flows through the pipeline:
//! retrieved documents and generation results. These are pure domain
//! models with no I/O dependencies.

pub mod document;
pub mod result;

pub use document::Document;
pub use result::{GenerationResult, PartialResult};
