//! Search engine and its query flows.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use jewel_catalogue::{
    CatalogueEntry, CatalogueError, CatalogueIndex, ImageStore, MetalClassifier, MetalLabel,
    RankedMatch, Ranker, RebuildReport, split_upload_name, stage_temp,
};
use jewel_embeddings::{EmbeddingOracle, TextExtractor, WithTimeout};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};

/// Where the label of an image query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Text found in the image.
    Extracted,
    /// Nothing usable was found; the configured fallback label was used.
    Fallback,
}

/// Outcome of an image query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSearchResult {
    /// Extracted text or the fallback label.
    pub query: String,

    pub label_source: LabelSource,

    /// Ranked catalogue matches, empty if the image could not be embedded.
    pub matches: Vec<RankedMatch>,
}

/// Outcome of an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestResult {
    /// Metal the image was classified as.
    pub metal: MetalLabel,

    /// Web path the image is served at.
    pub path: String,

    /// Catalogue size after the upload.
    pub entries: usize,
}

/// The initialized search service.
///
/// A value of this type only exists once the metal prototypes are embedded
/// and the catalogue has been indexed, so none of the flows can run against
/// a half-initialized engine. Use [`SearchEngine::builder`] to create one.
pub struct SearchEngine {
    config: SearchConfig,
    oracle: WithTimeout<Arc<dyn EmbeddingOracle>>,
    extractor: WithTimeout<Arc<dyn TextExtractor>>,
    classifier: MetalClassifier,
    index: CatalogueIndex,
    store: ImageStore,
    ranker: Box<dyn Ranker>,
}

impl SearchEngine {
    /// Create a new search engine builder.
    pub fn builder(config: SearchConfig) -> SearchEngineBuilder {
        SearchEngineBuilder::new(config)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn index(&self) -> &CatalogueIndex {
        &self.index
    }

    pub fn classifier(&self) -> &MetalClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Rank the catalogue against a text query.
    ///
    /// A blank query returns no results without calling the oracle. If the
    /// query names a metal, only that metal's images are considered. An
    /// oracle outage or timeout yields an empty result.
    pub async fn text_search(&self, query: &str) -> Result<Vec<RankedMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Processing text query: {query}");
        let Some(vector) = recover("text embedding", self.oracle.embed_text(query).await)? else {
            return Ok(Vec::new());
        };

        let candidates = match MetalLabel::mentioned_in(query) {
            Some(metal) => {
                debug!("Restricting query to {metal}");
                self.index.snapshot_filtered(metal).await
            }
            None => self.index.snapshot().await,
        };

        Ok(self.ranker.rank(&vector, &candidates)?)
    }

    /// Rank the whole catalogue against an uploaded image.
    ///
    /// The label is the image's extracted text, or the fallback label when
    /// extraction finds nothing or fails. A staging failure or a per-request
    /// embedding failure degrades to an empty match list. The staged copy is
    /// removed on every path.
    pub async fn image_search<B>(&self, bytes: B, filename: Option<&str>) -> Result<ImageSearchResult>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        let extension = filename
            .and_then(|name| split_upload_name(name).ok())
            .map_or_else(|| "jpg".to_string(), |(_, extension)| extension);

        let staged = match stage_temp(bytes, &extension).await {
            Ok(staged) => staged,
            Err(CatalogueError::Io(e)) => {
                warn!("Could not stage query image, degrading: {e}");
                return Ok(self.fallback_result(Vec::new()));
            }
            Err(e) => return Err(e.into()),
        };

        // Extraction only feeds the label, so any failure falls back.
        let extracted = match self.extractor.extract_text(staged.path()).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!("Text extraction failed, using fallback label: {e}");
                String::new()
            }
        };
        let (query, label_source) = if extracted.is_empty() {
            (self.config.fallback_label.clone(), LabelSource::Fallback)
        } else {
            (extracted, LabelSource::Extracted)
        };

        let matches = match recover("image embedding", self.oracle.embed_image(staged.path()).await)? {
            Some(vector) => {
                let candidates = self.index.snapshot().await;
                self.ranker.rank(&vector, &candidates)?
            }
            None => Vec::new(),
        };

        info!(
            "Image query labelled {query:?} ({label_source:?}) matched {} images",
            matches.len()
        );
        Ok(ImageSearchResult {
            query,
            label_source,
            matches,
        })
    }

    /// Classify an uploaded image, store it under its metal and add it to
    /// the catalogue.
    ///
    /// Embedding and classification happen before anything is written. If
    /// storing the file fails nothing is indexed. If indexing fails after the
    /// file was stored, the image stays on disk unindexed until the next
    /// rebuild.
    pub async fn ingest<B>(&self, bytes: B, filename: &str) -> Result<IngestResult>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        if bytes.as_ref().is_empty() {
            return Err(SearchError::InvalidUpload(format!("{filename:?} is empty")));
        }
        let (_, extension) = split_upload_name(filename)?;

        let staged = self.store.stage_upload(bytes, &extension).await?;
        let embedding = self.oracle.embed_image(staged.path()).await?;
        let metal = self.classifier.classify(&embedding)?;

        // Held from persist to append; a rebuild runs wholly before or after.
        let writer = self.index.writer().await;
        let stored = self.store.persist(staged, metal, filename).await?;

        let indexed = async {
            let path = self.store.web_path(&stored)?;
            let entries = writer
                .append(CatalogueEntry::new(path.clone(), embedding, metal))
                .await?;
            Ok::<_, CatalogueError>((path, entries))
        }
        .await;
        drop(writer);

        match indexed {
            Ok((path, entries)) => {
                info!("Ingested {path} as {metal} ({entries} images in catalogue)");
                Ok(IngestResult {
                    metal,
                    path,
                    entries,
                })
            }
            Err(e) => {
                error!(
                    "Stored {} but could not index it; it will appear after the next rebuild: {e}",
                    stored.display()
                );
                Err(e.into())
            }
        }
    }

    /// Re-index the image directory from scratch.
    pub async fn reindex(&self) -> Result<RebuildReport> {
        Ok(self.index.rebuild(&self.store, &self.oracle).await?)
    }

    fn fallback_result(&self, matches: Vec<RankedMatch>) -> ImageSearchResult {
        ImageSearchResult {
            query: self.config.fallback_label.clone(),
            label_source: LabelSource::Fallback,
            matches,
        }
    }
}

/// Swallow per-request oracle failures; surface configuration failures.
fn recover<T>(step: &str, result: jewel_embeddings::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_recoverable() => {
            warn!("{step} failed, degrading: {e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Builder for [`SearchEngine`]; the engine's "not ready" state.
pub struct SearchEngineBuilder {
    config: SearchConfig,
    oracle: Option<Arc<dyn EmbeddingOracle>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    ranker: Option<Box<dyn Ranker>>,
}

impl SearchEngineBuilder {
    /// Create a new builder.
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            oracle: None,
            extractor: None,
            ranker: None,
        }
    }

    /// Use this embedding oracle instead of the configured HTTP one.
    pub fn with_oracle(mut self, oracle: Arc<dyn EmbeddingOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Use this text extractor instead of the configured one.
    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the relative-threshold ranker.
    pub fn with_ranker(mut self, ranker: impl Ranker + 'static) -> Self {
        self.ranker = Some(Box::new(ranker));
        self
    }

    /// Run the initialization phase and return a ready engine.
    ///
    /// Creates the image directories, embeds the metal prototypes and indexes
    /// the catalogue. Any error here is a startup failure.
    pub async fn initialize(self) -> Result<SearchEngine> {
        let config = self.config;
        info!("Initializing search engine");

        if config.ranking.max_results == 0 {
            return Err(SearchError::Config(
                "ranking.max_results must be at least 1".to_string(),
            ));
        }
        let ratio = config.ranking.threshold_ratio;
        if ratio.is_nan() || ratio <= 0.0 || ratio > 1.0 {
            return Err(SearchError::Config(format!(
                "ranking.threshold_ratio must be in (0, 1], got {ratio}"
            )));
        }

        let timeout = config.oracle.timeout();
        let oracle = WithTimeout::new(
            self.oracle
                .unwrap_or_else(|| Arc::new(config.oracle.embedding_oracle())),
            timeout,
        );
        let extractor = WithTimeout::new(
            self.extractor
                .unwrap_or_else(|| config.oracle.text_extractor()),
            timeout,
        );
        let ranker = self
            .ranker
            .unwrap_or_else(|| Box::new(config.ranking.ranker()));

        let store = config.image_store();
        store.ensure_layout().await?;

        let classifier = MetalClassifier::initialize(&oracle, &config.metal_phrases)
            .await
            .map_err(|e| startup_error("metal prototypes", e))?;

        let index = CatalogueIndex::new(oracle.dimension());
        let report = index.rebuild(&store, &oracle).await?;
        info!(
            "Search engine ready: {} images indexed, {} skipped, oracle {} ({} dimensions)",
            report.indexed,
            report.skipped,
            oracle.name(),
            oracle.dimension()
        );

        Ok(SearchEngine {
            config,
            oracle,
            extractor,
            classifier,
            index,
            store,
            ranker,
        })
    }
}

fn startup_error(step: &str, e: CatalogueError) -> SearchError {
    error!("Initialization failed while computing {step}: {e}");
    e.into()
}
