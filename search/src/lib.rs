//! # Search
//!
//! Request flows over the jewelry catalogue: text queries, image queries and
//! upload ingestion, plus the initialization phase that makes them possible.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jewel_search::{SearchConfig, SearchEngine};
//!
//! let engine = SearchEngine::builder(SearchConfig::new("static"))
//!     .initialize()
//!     .await?;
//!
//! let matches = engine.text_search("gold ring").await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::{DEFAULT_FALLBACK_LABEL, OracleConfig, RankingConfig, SearchConfig};
pub use engine::{ImageSearchResult, IngestResult, LabelSource, SearchEngine, SearchEngineBuilder};
pub use error::{Result, SearchError};
