//! # Catalogue
//!
//! The searchable jewelry catalogue: metal labels and their classifier, the
//! shared in-memory index, the ranking engine and the on-disk image layout.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Catalogue                                    │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ImageStore ──► CatalogueIndex ──► CatalogueSnapshot           │
//! │       │               │                   │                     │
//! │       ▼               ▼                   ▼                     │
//! │  staged uploads  MetalClassifier        Ranker                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod metal;
pub mod ranking;
pub mod store;

pub use error::{CatalogueError, Result};
pub use index::{CatalogueEntry, CatalogueIndex, CatalogueSnapshot, CatalogueWriter, RebuildReport};
pub use metal::{MetalClassifier, MetalLabel, MetalPhrases};
pub use ranking::{
    DEFAULT_RESULT_CAP, DEFAULT_THRESHOLD_RATIO, RankedMatch, Ranker, RelativeThresholdRanker,
};
pub use store::{IMAGE_EXTENSIONS, ImageStore, StagedImage, is_image, split_upload_name, stage_temp};
