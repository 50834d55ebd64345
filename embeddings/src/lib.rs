//! # Embeddings
//!
//! Unit-norm embedding vectors and the external oracles that produce them
//! for the jewelry catalogue search.
//!
//! ## Features
//!
//! - **EmbeddingVector**: dimension-checked, unit-norm vector with dot-product similarity
//! - **Embedding Oracle**: image and text embeddings in one shared vector space
//! - **Text Extraction Oracle**: best-effort OCR used for query labels
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings                                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingOracle ──► EmbeddingVector ──► similarity()          │
//! │  TextExtractor   ──► label text                                 │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  HTTP model sidecars                                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod extraction;
mod http;
pub mod provider;
pub mod similarity;
pub mod timeout;

pub use error::{EmbeddingError, Result};
pub use extraction::{DisabledTextExtractor, HttpTextExtractor, TextExtractor};
pub use provider::{EmbeddingOracle, HttpEmbeddingOracle};
pub use similarity::{EmbeddingVector, NORM_TOLERANCE, similarity};
pub use timeout::WithTimeout;

/// Dimension of embeddings produced by a ViT-B/32 CLIP model.
pub const DEFAULT_DIMENSION: usize = 512;
