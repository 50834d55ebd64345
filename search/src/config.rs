//! Configuration for the search engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use jewel_catalogue::{
    DEFAULT_RESULT_CAP, DEFAULT_THRESHOLD_RATIO, ImageStore, MetalPhrases, RelativeThresholdRanker,
};
use jewel_embeddings::{
    DEFAULT_DIMENSION, DisabledTextExtractor, HttpEmbeddingOracle, HttpTextExtractor,
    TextExtractor,
};

/// Label reported for image queries whose text extraction finds nothing.
pub const DEFAULT_FALLBACK_LABEL: &str = "jewelry";

/// Configuration for the search engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Directory served as static content.
    pub static_dir: PathBuf,

    /// Image directory, relative to `static_dir`.
    pub image_subdir: PathBuf,

    /// URL prefix `static_dir` is served from.
    pub url_prefix: String,

    /// Label used when an image query yields no text.
    pub fallback_label: String,

    /// Oracle endpoints.
    pub oracle: OracleConfig,

    /// Ranking parameters.
    pub ranking: RankingConfig,

    /// Phrases that define the metal prototypes.
    pub metal_phrases: MetalPhrases,
}

impl SearchConfig {
    /// Create a configuration serving images from `static_dir`.
    pub fn new(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            image_subdir: PathBuf::from("images"),
            url_prefix: "/static".to_string(),
            fallback_label: DEFAULT_FALLBACK_LABEL.to_string(),
            oracle: OracleConfig::default(),
            ranking: RankingConfig::default(),
            metal_phrases: MetalPhrases::default(),
        }
    }

    /// Set the oracle configuration.
    pub fn with_oracle(mut self, config: OracleConfig) -> Self {
        self.oracle = config;
        self
    }

    /// Set the ranking configuration.
    pub fn with_ranking(mut self, config: RankingConfig) -> Self {
        self.ranking = config;
        self
    }

    /// Set the label used when image text extraction finds nothing.
    pub fn with_fallback_label(mut self, label: impl Into<String>) -> Self {
        self.fallback_label = label.into();
        self
    }

    /// The image layout described by this configuration.
    pub fn image_store(&self) -> ImageStore {
        ImageStore::new(&self.static_dir)
            .with_image_subdir(&self.image_subdir)
            .with_url_prefix(self.url_prefix.clone())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::new("static")
    }
}

/// Where the embedding and OCR oracles live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Base URL of the embedding server.
    pub embedding_url: String,

    /// Model name forwarded to the embedding server.
    pub model: Option<String>,

    /// Dimension of the model's embeddings.
    pub dimension: usize,

    /// Base URL of the OCR server; text extraction is disabled when unset.
    pub ocr_url: Option<String>,

    /// Upper bound for any single oracle call, in milliseconds.
    pub timeout_ms: u64,
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// HTTP embedding oracle for `embedding_url`.
    pub fn embedding_oracle(&self) -> HttpEmbeddingOracle {
        let oracle =
            HttpEmbeddingOracle::new(self.embedding_url.clone()).with_dimension(self.dimension);
        match &self.model {
            Some(model) => oracle.with_model(model.clone()),
            None => oracle,
        }
    }

    /// HTTP OCR oracle for `ocr_url`, or one that never finds text.
    pub fn text_extractor(&self) -> Arc<dyn TextExtractor> {
        match &self.ocr_url {
            Some(url) => Arc::new(HttpTextExtractor::new(url.clone())),
            None => Arc::new(DisabledTextExtractor),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            embedding_url: "http://127.0.0.1:8001".to_string(),
            model: Some("ViT-B/32".to_string()),
            dimension: DEFAULT_DIMENSION,
            ocr_url: None,
            timeout_ms: 30_000,
        }
    }
}

/// Parameters of the relative-threshold ranker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Fraction of the best score a result must reach.
    pub threshold_ratio: f32,

    /// Maximum number of results to return.
    pub max_results: usize,
}

impl RankingConfig {
    pub fn ranker(&self) -> RelativeThresholdRanker {
        RelativeThresholdRanker::new(self.threshold_ratio, self.max_results)
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            threshold_ratio: DEFAULT_THRESHOLD_RATIO,
            max_results: DEFAULT_RESULT_CAP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_catalogue_layout() {
        let config = SearchConfig::default();
        let store = config.image_store();

        assert_eq!(store.image_dir(), std::path::Path::new("static/images"));
        assert_eq!(config.fallback_label, "jewelry");
        assert_eq!(config.ranking.max_results, 8);
        assert!((config.ranking.threshold_ratio - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SearchConfig = toml::from_str(
            r#"
            static_dir = "/srv/jewelry"

            [oracle]
            ocr_url = "http://127.0.0.1:8002"
            timeout_ms = 500

            [metal_phrases]
            copper = "rose copper bracelet"
            "#,
        )
        .unwrap();

        assert_eq!(config.static_dir, PathBuf::from("/srv/jewelry"));
        assert_eq!(config.oracle.timeout(), Duration::from_millis(500));
        assert_eq!(config.oracle.dimension, DEFAULT_DIMENSION);
        assert_eq!(config.metal_phrases.copper, "rose copper bracelet");
        assert_eq!(config.metal_phrases.gold, MetalPhrases::default().gold);
        assert_eq!(config.text_extractor_name(), "http");
    }

    #[test]
    fn test_extraction_disabled_without_url() {
        assert_eq!(SearchConfig::default().text_extractor_name(), "disabled");
    }

    impl SearchConfig {
        fn text_extractor_name(&self) -> String {
            self.oracle.text_extractor().name().to_string()
        }
    }
}
