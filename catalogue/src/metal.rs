//! Metal labels and the prototype-based metal classifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use jewel_embeddings::{EmbeddingError, EmbeddingOracle, EmbeddingVector, similarity};

use crate::error::{CatalogueError, Result};

/// The metals the catalogue is partitioned by.
///
/// Declaration order is significant: it is the scan order for rebuilds, the
/// match order for query filters and the tie-break order for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetalLabel {
    Gold,
    Silver,
    Copper,
}

impl MetalLabel {
    /// Every label, in enumeration order.
    pub const ALL: [MetalLabel; 3] = [MetalLabel::Gold, MetalLabel::Silver, MetalLabel::Copper];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::Copper => "copper",
        }
    }

    /// First label whose name occurs in `text`, ignoring case.
    pub fn mentioned_in(text: &str) -> Option<MetalLabel> {
        let lowered = text.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| lowered.contains(label.as_str()))
    }
}

impl fmt::Display for MetalLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetalLabel {
    type Err = CatalogueError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CatalogueError::UnknownMetal(s.to_string()))
    }
}

/// Descriptive phrases embedded once at startup to obtain the prototypes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalPhrases {
    pub gold: String,
    pub silver: String,
    pub copper: String,
}

impl MetalPhrases {
    pub fn phrase(&self, label: MetalLabel) -> &str {
        match label {
            MetalLabel::Gold => &self.gold,
            MetalLabel::Silver => &self.silver,
            MetalLabel::Copper => &self.copper,
        }
    }
}

impl Default for MetalPhrases {
    fn default() -> Self {
        Self {
            gold: "gold jewelry yellow metal luxury".to_string(),
            silver: "silver jewelry white metal".to_string(),
            copper: "copper reddish metal".to_string(),
        }
    }
}

/// Assigns a metal to an image embedding by nearest prototype.
///
/// There is no confidence threshold and no "unknown" outcome: every vector
/// gets the label of its most similar prototype, with exact ties going to
/// the label that comes first in [`MetalLabel::ALL`].
#[derive(Debug, Clone)]
pub struct MetalClassifier {
    /// One prototype per label, in enumeration order.
    prototypes: Vec<(MetalLabel, EmbeddingVector)>,
}

impl MetalClassifier {
    /// Build a classifier from explicit prototype vectors.
    ///
    /// Every label must be present exactly once and all prototypes must share
    /// one dimension.
    pub fn from_prototypes(
        prototypes: impl IntoIterator<Item = (MetalLabel, EmbeddingVector)>,
    ) -> Result<Self> {
        let mut prototypes: Vec<(MetalLabel, EmbeddingVector)> = prototypes.into_iter().collect();
        prototypes.sort_by_key(|(label, _)| *label);

        let labels: Vec<MetalLabel> = prototypes.iter().map(|(label, _)| *label).collect();
        if labels != MetalLabel::ALL {
            return Err(CatalogueError::InvalidPrototypes(format!(
                "expected one prototype for each of {:?}, got {labels:?}",
                MetalLabel::ALL
            )));
        }

        let dimension = prototypes[0].1.dimension();
        if let Some((label, vector)) = prototypes
            .iter()
            .find(|(_, vector)| vector.dimension() != dimension)
        {
            return Err(CatalogueError::InvalidPrototypes(format!(
                "{label} prototype has dimension {}, expected {dimension}",
                vector.dimension()
            )));
        }

        Ok(Self { prototypes })
    }

    /// Embed the descriptive phrases with `oracle` and build the classifier.
    ///
    /// This is the classifier's initialization phase; any oracle failure here
    /// is a startup failure.
    pub async fn initialize(oracle: &dyn EmbeddingOracle, phrases: &MetalPhrases) -> Result<Self> {
        let mut prototypes = Vec::with_capacity(MetalLabel::ALL.len());
        for label in MetalLabel::ALL {
            let vector = oracle.embed_text(phrases.phrase(label)).await?;
            if vector.dimension() != oracle.dimension() {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: oracle.dimension(),
                    actual: vector.dimension(),
                }
                .into());
            }
            debug!("Embedded {label} prototype phrase");
            prototypes.push((label, vector));
        }

        info!("Metal classifier initialized with {} prototypes", prototypes.len());
        Self::from_prototypes(prototypes)
    }

    /// Dimension shared by all prototypes.
    pub fn dimension(&self) -> usize {
        self.prototypes[0].1.dimension()
    }

    pub fn prototype(&self, label: MetalLabel) -> &EmbeddingVector {
        // `from_prototypes` guarantees one entry per label in enum order.
        &self.prototypes[label as usize].1
    }

    /// Label of the prototype most similar to `vector`.
    pub fn classify(&self, vector: &EmbeddingVector) -> Result<MetalLabel> {
        let (first_label, first_prototype) = &self.prototypes[0];
        let mut best = *first_label;
        let mut best_score = similarity(vector, first_prototype)?;

        for (label, prototype) in &self.prototypes[1..] {
            let score = similarity(vector, prototype)?;
            // Strict comparison keeps the earlier label on exact ties.
            if score > best_score {
                best = *label;
                best_score = score;
            }
        }

        debug!("Classified embedding as {best} (score {best_score:.4})");
        Ok(best)
    }
}
