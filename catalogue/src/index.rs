//! The in-memory catalogue index.
//!
//! Entries live in one copy-on-write vector. Readers clone an `Arc` to it and
//! score without holding any lock; writers are serialized and swap or extend
//! the vector under a short write lock, so a snapshot never changes length
//! and never shows a half-built entry.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

use jewel_embeddings::{EmbeddingError, EmbeddingOracle, EmbeddingVector};

use crate::error::Result;
use crate::metal::MetalLabel;
use crate::store::ImageStore;

/// One indexed catalogue image.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueEntry {
    /// Web path of the image, e.g. `/static/images/gold/ring.jpg`.
    pub path: String,

    /// Image embedding.
    pub embedding: EmbeddingVector,

    /// Metal the image is filed under.
    pub metal: MetalLabel,
}

impl CatalogueEntry {
    pub fn new(path: impl Into<String>, embedding: EmbeddingVector, metal: MetalLabel) -> Self {
        Self {
            path: path.into(),
            embedding,
            metal,
        }
    }
}

type Entries = Arc<Vec<Arc<CatalogueEntry>>>;

/// A point-in-time, immutable view of the catalogue.
#[derive(Debug, Clone, Default)]
pub struct CatalogueSnapshot {
    entries: Entries,
}

impl CatalogueSnapshot {
    pub fn new(entries: Vec<CatalogueEntry>) -> Self {
        Self {
            entries: Arc::new(entries.into_iter().map(Arc::new).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<CatalogueEntry>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogueEntry> {
        self.entries.iter().map(Arc::as_ref)
    }

    /// Entries filed under `metal`, in catalogue order.
    pub fn filtered(&self, metal: MetalLabel) -> CatalogueSnapshot {
        let entries = self
            .entries
            .iter()
            .filter(|entry| entry.metal == metal)
            .cloned()
            .collect();
        CatalogueSnapshot {
            entries: Arc::new(entries),
        }
    }

    /// Web paths of all entries, in catalogue order.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.path.as_str()).collect()
    }
}

/// Result of a full rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Entries in the rebuilt catalogue.
    pub indexed: usize,

    /// Image files skipped because their embedding failed.
    pub skipped: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

/// The authoritative, shared collection of catalogue entries.
pub struct CatalogueIndex {
    /// Current entries; replaced or extended only while `writer` is held.
    entries: RwLock<Entries>,

    /// Serializes mutations (append and rebuild).
    writer: Mutex<()>,

    /// Dimension every stored embedding must have.
    dimension: usize,
}

impl CatalogueIndex {
    /// Create an empty index for embeddings of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            writer: Mutex::new(()),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of entries right now.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// The whole catalogue as of this call.
    pub async fn snapshot(&self) -> CatalogueSnapshot {
        CatalogueSnapshot {
            entries: Arc::clone(&*self.entries.read().await),
        }
    }

    /// Entries filed under `metal`, as of this call.
    pub async fn snapshot_filtered(&self, metal: MetalLabel) -> CatalogueSnapshot {
        self.snapshot().await.filtered(metal)
    }

    /// Hold the mutation lock until the returned writer is dropped.
    ///
    /// Rebuilds wait for the writer, so work done while holding it (such as
    /// storing an upload on disk before indexing it) cannot interleave with a
    /// directory scan. Readers are never blocked.
    pub async fn writer(&self) -> CatalogueWriter<'_> {
        CatalogueWriter {
            index: self,
            _guard: self.writer.lock().await,
        }
    }

    /// Add one entry to the end of the catalogue and return the new length.
    pub async fn append(&self, entry: CatalogueEntry) -> Result<usize> {
        self.writer().await.append(entry).await
    }

    /// Discard every entry and re-index the image tree in `store`.
    ///
    /// Images are taken label by label in [`MetalLabel::ALL`] order and filed
    /// under the directory they were found in. An image whose embedding fails
    /// is skipped; a dimension mismatch aborts the rebuild and leaves the
    /// current catalogue in place. The new catalogue becomes visible in one
    /// swap once it is complete.
    pub async fn rebuild(
        &self,
        store: &ImageStore,
        oracle: &dyn EmbeddingOracle,
    ) -> Result<RebuildReport> {
        let start = Instant::now();
        let _writer = self.writer.lock().await;

        info!("Indexing images under {}", store.image_dir().display());

        let mut rebuilt = Vec::new();
        let mut skipped = 0;

        for metal in MetalLabel::ALL {
            for file in store.list_images(metal).await? {
                let embedding = match oracle.embed_image(&file).await {
                    Ok(embedding) => embedding,
                    Err(e @ EmbeddingError::DimensionMismatch { .. }) => return Err(e.into()),
                    Err(e) => {
                        warn!("Skipping {}: {e}", file.display());
                        skipped += 1;
                        continue;
                    }
                };
                self.check_dimension(&embedding)?;

                let path = store.web_path(&file)?;
                debug!("Indexed {path} as {metal}");
                rebuilt.push(Arc::new(CatalogueEntry::new(path, embedding, metal)));
            }
        }

        let indexed = rebuilt.len();
        *self.entries.write().await = Arc::new(rebuilt);

        let duration = start.elapsed();
        info!("Indexed {indexed} images in {duration:?} (skipped: {skipped})");

        Ok(RebuildReport {
            indexed,
            skipped,
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        })
    }

    fn check_dimension(&self, embedding: &EmbeddingVector) -> Result<()> {
        if embedding.dimension() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            }
            .into());
        }
        Ok(())
    }
}

/// Exclusive mutation access to a [`CatalogueIndex`].
pub struct CatalogueWriter<'a> {
    index: &'a CatalogueIndex,
    _guard: MutexGuard<'a, ()>,
}

impl CatalogueWriter<'_> {
    /// Add one entry to the end of the catalogue and return the new length.
    pub async fn append(&self, entry: CatalogueEntry) -> Result<usize> {
        self.index.check_dimension(&entry.embedding)?;

        let mut entries = self.index.entries.write().await;
        // Clones the vector only while an older snapshot is still alive.
        Arc::make_mut(&mut *entries).push(Arc::new(entry));
        let len = entries.len();
        drop(entries);

        debug!("Appended catalogue entry, {len} entries total");
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogueError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;
    use std::path::Path;
    use tempfile::TempDir;

    fn unit(values: &[f32]) -> EmbeddingVector {
        EmbeddingVector::normalized(values.to_vec()).unwrap()
    }

    /// Reads the embedding from the image file itself: comma-separated floats.
    /// Files containing `broken` fail like an oracle outage would.
    struct FileContentOracle;

    #[async_trait]
    impl EmbeddingOracle for FileContentOracle {
        fn name(&self) -> &str {
            "file-content"
        }

        fn dimension(&self) -> usize {
            3
        }

        async fn embed_text(&self, _text: &str) -> jewel_embeddings::Result<EmbeddingVector> {
            Err(EmbeddingError::OracleRequest("text not supported".to_string()))
        }

        async fn embed_image(&self, path: &Path) -> jewel_embeddings::Result<EmbeddingVector> {
            let content = tokio::fs::read_to_string(path).await?;
            if content.contains("broken") {
                return Err(EmbeddingError::OracleRequest("model crashed".to_string()));
            }
            let values = content
                .trim()
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;
            if values.len() != 3 {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: 3,
                    actual: values.len(),
                });
            }
            EmbeddingVector::normalized(values)
        }
    }

    fn write_image(store: &ImageStore, metal: MetalLabel, name: &str, content: &str) {
        let dir = store.metal_dir(metal);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[tokio::test]
    async fn test_append_and_snapshot() {
        let index = CatalogueIndex::new(2);
        let len = index
            .append(CatalogueEntry::new("/static/a.jpg", unit(&[1.0, 0.0]), MetalLabel::Gold))
            .await
            .unwrap();
        assert_eq!(len, 1);

        let snapshot = index.snapshot().await;
        assert_eq!(snapshot.paths(), vec!["/static/a.jpg"]);
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_appends() {
        let index = CatalogueIndex::new(2);
        index
            .append(CatalogueEntry::new("a", unit(&[1.0, 0.0]), MetalLabel::Gold))
            .await
            .unwrap();

        let before = index.snapshot().await;
        index
            .append(CatalogueEntry::new("b", unit(&[0.0, 1.0]), MetalLabel::Silver))
            .await
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(index.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_append_rejects_wrong_dimension() {
        let index = CatalogueIndex::new(3);
        let err = index
            .append(CatalogueEntry::new("a", unit(&[1.0, 0.0]), MetalLabel::Gold))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_filtered_snapshot() {
        let index = CatalogueIndex::new(2);
        for (path, metal) in [
            ("g1", MetalLabel::Gold),
            ("s1", MetalLabel::Silver),
            ("g2", MetalLabel::Gold),
        ] {
            index
                .append(CatalogueEntry::new(path, unit(&[1.0, 0.0]), metal))
                .await
                .unwrap();
        }

        let gold = index.snapshot_filtered(MetalLabel::Gold).await;
        assert_eq!(gold.paths(), vec!["g1", "g2"]);
        assert!(index.snapshot_filtered(MetalLabel::Copper).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let index = Arc::new(CatalogueIndex::new(2));
        let mut handles = Vec::new();
        for i in 0..32 {
            let index = Arc::clone(&index);
            handles.push(tokio::spawn(async move {
                index
                    .append(CatalogueEntry::new(
                        format!("img-{i}"),
                        unit(&[1.0, i as f32]),
                        MetalLabel::Copper,
                    ))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = index.snapshot().await;
        assert_eq!(snapshot.len(), 32);
        let unique: BTreeSet<&str> = snapshot.paths().into_iter().collect();
        assert_eq!(unique.len(), 32);
    }

    #[tokio::test]
    async fn test_rebuild_waits_for_held_writer() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Gold, "ring.jpg", "1,0,0");

        let index = CatalogueIndex::new(3);
        let writer = index.writer().await;

        let rebuild = index.rebuild(&store, &FileContentOracle);
        let upload = async {
            // Store then index while the rebuild is queued behind the writer.
            write_image(&store, MetalLabel::Copper, "bangle.jpg", "0,0,1");
            let len = writer
                .append(CatalogueEntry::new(
                    "/static/images/copper/bangle.jpg",
                    unit(&[0.0, 0.0, 1.0]),
                    MetalLabel::Copper,
                ))
                .await
                .unwrap();
            drop(writer);
            len
        };
        let (report, appended) = tokio::join!(rebuild, upload);

        assert_eq!(appended, 1);
        assert_eq!(report.unwrap().indexed, 2);
        assert_eq!(
            index.snapshot().await.paths(),
            vec!["/static/images/gold/ring.jpg", "/static/images/copper/bangle.jpg"]
        );
    }

    #[tokio::test]
    async fn test_rebuild_uses_directory_labels() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Gold, "ring.jpg", "1,0,0");
        write_image(&store, MetalLabel::Silver, "chain.PNG", "1,0,0");
        write_image(&store, MetalLabel::Copper, "notes.txt", "0,0,1");

        let index = CatalogueIndex::new(3);
        let report = index.rebuild(&store, &FileContentOracle).await.unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped, 0);

        let snapshot = index.snapshot().await;
        let labelled: Vec<(&str, MetalLabel)> = snapshot
            .iter()
            .map(|entry| (entry.path.as_str(), entry.metal))
            .collect();
        assert_eq!(
            labelled,
            vec![
                ("/static/images/gold/ring.jpg", MetalLabel::Gold),
                ("/static/images/silver/chain.PNG", MetalLabel::Silver),
            ]
        );
    }

    #[tokio::test]
    async fn test_rebuild_skips_failed_images() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Gold, "a.jpg", "1,0,0");
        write_image(&store, MetalLabel::Gold, "b.jpg", "broken");
        write_image(&store, MetalLabel::Gold, "c.webp", "0,1,0");

        let index = CatalogueIndex::new(3);
        let report = index.rebuild(&store, &FileContentOracle).await.unwrap();

        assert_eq!(report.indexed, 2);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_rebuild_aborts_on_dimension_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Gold, "a.jpg", "1,0,0");

        let index = CatalogueIndex::new(3);
        index.rebuild(&store, &FileContentOracle).await.unwrap();

        write_image(&store, MetalLabel::Silver, "wide.jpg", "1,0,0,0");
        let err = index.rebuild(&store, &FileContentOracle).await.unwrap_err();

        assert!(matches!(
            err,
            CatalogueError::Embedding(EmbeddingError::DimensionMismatch { .. })
        ));
        // The previous catalogue stays visible.
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_appended_entries() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Copper, "bangle.jpeg", "0,0,1");

        let index = CatalogueIndex::new(3);
        index
            .append(CatalogueEntry::new("stale", unit(&[1.0, 0.0, 0.0]), MetalLabel::Gold))
            .await
            .unwrap();

        index.rebuild(&store, &FileContentOracle).await.unwrap();
        assert_eq!(
            index.snapshot().await.paths(),
            vec!["/static/images/copper/bangle.jpeg"]
        );
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        write_image(&store, MetalLabel::Gold, "a.jpg", "1,0,0");
        write_image(&store, MetalLabel::Silver, "b.jpg", "0.2,0.9,0.1");
        write_image(&store, MetalLabel::Copper, "c.png", "0,0.3,1");

        let index = CatalogueIndex::new(3);
        index.rebuild(&store, &FileContentOracle).await.unwrap();
        let first = index.snapshot().await;
        index.rebuild(&store, &FileContentOracle).await.unwrap();
        let second = index.snapshot().await;

        let first_paths: BTreeSet<&str> = first.paths().into_iter().collect();
        let second_paths: BTreeSet<&str> = second.paths().into_iter().collect();
        assert_eq!(first_paths, second_paths);

        for entry in first.iter() {
            let twin = second
                .iter()
                .find(|other| other.path == entry.path)
                .unwrap();
            let sim = entry.embedding.similarity(&twin.embedding).unwrap();
            assert!((sim - 1.0).abs() < 1e-4);
        }
    }
}
