//! On-disk layout of the catalogue images.
//!
//! ```text
//! <static root>/
//!   images/
//!     gold/    ring.jpg ...
//!     silver/  chain.png ...
//!     copper/  bangle.webp ...
//! ```
//!
//! Uploads are staged as scoped temporary files inside the image directory
//! so that moving them into a metal directory is a rename on one filesystem.

use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempPath;
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CatalogueError, Result};
use crate::metal::MetalLabel;

/// Extensions (lowercase) of files treated as catalogue images.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Numbered alternatives tried before an upload name is given up on.
const MAX_RENAME_ATTEMPTS: usize = 1000;

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`], ignoring case.
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

/// An image written to a temporary file. The file is deleted when this value
/// is dropped unless it was persisted first.
#[derive(Debug)]
pub struct StagedImage {
    path: TempPath,
}

impl StagedImage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Location of the catalogue images and their web paths.
#[derive(Debug, Clone)]
pub struct ImageStore {
    /// Directory served under `url_prefix`.
    static_root: PathBuf,

    /// Directory holding one subdirectory per metal.
    image_dir: PathBuf,

    /// URL prefix of the static root.
    url_prefix: String,
}

impl ImageStore {
    /// Store rooted at `static_root`, with images under `static_root/images`
    /// served from `/static`.
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        let static_root = static_root.into();
        Self {
            image_dir: static_root.join("images"),
            static_root,
            url_prefix: "/static".to_string(),
        }
    }

    /// Set the image directory, relative to the static root.
    pub fn with_image_subdir(mut self, subdir: impl AsRef<Path>) -> Self {
        self.image_dir = self.static_root.join(subdir);
        self
    }

    /// Set the URL prefix the static root is served from.
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn image_dir(&self) -> &Path {
        &self.image_dir
    }

    pub fn metal_dir(&self, metal: MetalLabel) -> PathBuf {
        self.image_dir.join(metal.as_str())
    }

    /// Create the image directory and every metal directory.
    pub async fn ensure_layout(&self) -> Result<()> {
        for metal in MetalLabel::ALL {
            let dir = self.metal_dir(metal);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| CatalogueError::CreateDirectory(format!("{}: {e}", dir.display())))?;
        }
        info!("Image store ready at {}", self.image_dir.display());
        Ok(())
    }

    /// Image files directly inside the metal's directory, sorted by name.
    ///
    /// A missing directory is created and yields no files.
    pub async fn list_images(&self, metal: MetalLabel) -> Result<Vec<PathBuf>> {
        let dir = self.metal_dir(metal);
        if !fs::try_exists(&dir).await? {
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| CatalogueError::CreateDirectory(format!("{}: {e}", dir.display())))?;
            return Ok(Vec::new());
        }

        let files = tokio::task::spawn_blocking(move || {
            WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file() && is_image(e.path()))
                .map(walkdir::DirEntry::into_path)
                .collect::<Vec<_>>()
        })
        .await
        .map_err(std::io::Error::other)?;

        debug!("Found {} {metal} images", files.len());
        Ok(files)
    }

    /// Web path of a file under the static root, always with `/` separators.
    pub fn web_path(&self, file: &Path) -> Result<String> {
        let relative = file
            .strip_prefix(&self.static_root)
            .map_err(|_| CatalogueError::OutsideStaticRoot(file.display().to_string()))?;

        let mut web = self.url_prefix.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    web.push('/');
                    web.push_str(&part.to_string_lossy());
                }
                Component::CurDir => {}
                _ => {
                    return Err(CatalogueError::OutsideStaticRoot(
                        file.display().to_string(),
                    ));
                }
            }
        }
        Ok(web)
    }

    /// Stage an upload next to the catalogue so it can later be persisted.
    pub async fn stage_upload<B>(&self, bytes: B, extension: &str) -> Result<StagedImage>
    where
        B: AsRef<[u8]> + Send + 'static,
    {
        fs::create_dir_all(&self.image_dir).await.map_err(|e| {
            CatalogueError::CreateDirectory(format!("{}: {e}", self.image_dir.display()))
        })?;
        write_staged(Some(self.image_dir.clone()), bytes, extension).await
    }

    /// Move a staged upload into the metal's directory.
    ///
    /// Only the final component of `filename` is used. An existing image is
    /// never overwritten: `ring.jpg` becomes `ring-1.jpg`, `ring-2.jpg`, ...
    /// On failure the staged file is removed.
    pub async fn persist(
        &self,
        staged: StagedImage,
        metal: MetalLabel,
        filename: &str,
    ) -> Result<PathBuf> {
        let (stem, extension) = split_upload_name(filename)?;
        let dir = self.metal_dir(metal);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CatalogueError::CreateDirectory(format!("{}: {e}", dir.display())))?;

        let destination = tokio::task::spawn_blocking(move || {
            let mut temp = staged.path;
            for attempt in 0..MAX_RENAME_ATTEMPTS {
                let name = if attempt == 0 {
                    format!("{stem}.{extension}")
                } else {
                    format!("{stem}-{attempt}.{extension}")
                };
                let candidate = dir.join(name);
                match temp.persist_noclobber(&candidate) {
                    Ok(()) => return Ok(candidate),
                    Err(e) if e.error.kind() == ErrorKind::AlreadyExists => temp = e.path,
                    Err(e) => {
                        return Err(CatalogueError::Persist(format!(
                            "{}: {}",
                            candidate.display(),
                            e.error
                        )));
                    }
                }
            }
            Err(CatalogueError::Persist(format!(
                "no free name for {stem}.{extension} in {}",
                dir.display()
            )))
        })
        .await
        .map_err(std::io::Error::other)??;

        info!("Stored upload as {}", destination.display());
        Ok(destination)
    }
}

/// Stage bytes in the system temporary directory.
pub async fn stage_temp<B>(bytes: B, extension: &str) -> Result<StagedImage>
where
    B: AsRef<[u8]> + Send + 'static,
{
    write_staged(None, bytes, extension).await
}

async fn write_staged<B>(dir: Option<PathBuf>, bytes: B, extension: &str) -> Result<StagedImage>
where
    B: AsRef<[u8]> + Send + 'static,
{
    let suffix = format!(".{extension}");
    let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".staged-").suffix(&suffix);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes.as_ref())?;
        file.flush()?;
        Ok(file.into_temp_path())
    })
    .await
    .map_err(std::io::Error::other)??;

    debug!("Staged image at {}", path.display());
    Ok(StagedImage { path })
}

/// Split a client-supplied file name into a safe stem and an image extension.
pub fn split_upload_name(filename: &str) -> Result<(String, String)> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name.starts_with('.') {
        return Err(CatalogueError::InvalidFilename(filename.to_string()));
    }

    let path = Path::new(name);
    if !is_image(path) {
        return Err(CatalogueError::UnsupportedExtension(filename.to_string()));
    }

    let stem = path.file_stem().and_then(|s| s.to_str());
    let extension = path.extension().and_then(|s| s.to_str());
    match (stem, extension) {
        (Some(stem), Some(extension)) if !stem.is_empty() => {
            Ok((stem.to_string(), extension.to_string()))
        }
        _ => Err(CatalogueError::InvalidFilename(filename.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_is_image() {
        assert!(is_image(Path::new("a/ring.JPG")));
        assert!(is_image(Path::new("chain.webp")));
        assert!(!is_image(Path::new("notes.txt")));
        assert!(!is_image(Path::new("jpg")));
    }

    #[test]
    fn test_web_path_uses_forward_slashes() {
        let store = ImageStore::new("/srv/static");
        let file = Path::new("/srv/static")
            .join("images")
            .join("gold")
            .join("ring.jpg");
        assert_eq!(
            store.web_path(&file).unwrap(),
            "/static/images/gold/ring.jpg"
        );
    }

    #[test]
    fn test_web_path_rejects_outside_files() {
        let store = ImageStore::new("/srv/static");
        assert!(store.web_path(Path::new("/etc/passwd")).is_err());
    }

    #[test]
    fn test_custom_prefix_and_subdir() {
        let store = ImageStore::new("/srv/www")
            .with_image_subdir("catalogue")
            .with_url_prefix("/assets/");
        let file = store.metal_dir(MetalLabel::Silver).join("chain.png");
        assert_eq!(
            store.web_path(&file).unwrap(),
            "/assets/catalogue/silver/chain.png"
        );
    }

    #[test]
    fn test_split_upload_name() {
        assert_eq!(
            split_upload_name("ring.JPG").unwrap(),
            ("ring".to_string(), "JPG".to_string())
        );
        assert_eq!(
            split_upload_name("../../etc/ring.png").unwrap(),
            ("ring".to_string(), "png".to_string())
        );
        assert_eq!(
            split_upload_name("C:\\Users\\me\\bangle.webp").unwrap(),
            ("bangle".to_string(), "webp".to_string())
        );
        assert!(matches!(
            split_upload_name("notes.txt"),
            Err(CatalogueError::UnsupportedExtension(_))
        ));
        assert!(matches!(
            split_upload_name("dir/"),
            Err(CatalogueError::InvalidFilename(_))
        ));
        assert!(matches!(
            split_upload_name(".hidden.jpg"),
            Err(CatalogueError::InvalidFilename(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_layout_creates_metal_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path().join("static"));
        store.ensure_layout().await.unwrap();

        for metal in MetalLabel::ALL {
            assert!(store.metal_dir(metal).is_dir());
        }
    }

    #[tokio::test]
    async fn test_list_images_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());
        let dir = store.metal_dir(MetalLabel::Gold);
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["b.png", "a.jpg", "c.txt", "nested/d.jpg"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let files = store.list_images(MetalLabel::Gold).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn test_list_images_creates_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        let files = store.list_images(MetalLabel::Copper).await.unwrap();
        assert!(files.is_empty());
        assert!(store.metal_dir(MetalLabel::Copper).is_dir());
    }

    #[tokio::test]
    async fn test_staged_file_is_removed_on_drop() {
        let staged = stage_temp(b"bytes".to_vec(), "jpg").await.unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_persist_moves_staged_upload() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        let staged = store.stage_upload(b"ring".to_vec(), "jpg").await.unwrap();
        let staged_path = staged.path().to_path_buf();
        let stored = store
            .persist(staged, MetalLabel::Gold, "ring.jpg")
            .await
            .unwrap();

        assert_eq!(stored, store.metal_dir(MetalLabel::Gold).join("ring.jpg"));
        assert_eq!(std::fs::read(&stored).unwrap(), b"ring");
        assert!(!staged_path.exists());
    }

    #[tokio::test]
    async fn test_persist_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        let mut stored = Vec::new();
        for content in ["first", "second", "third"] {
            let staged = store
                .stage_upload(content.as_bytes().to_vec(), "jpg")
                .await
                .unwrap();
            stored.push(
                store
                    .persist(staged, MetalLabel::Silver, "chain.jpg")
                    .await
                    .unwrap(),
            );
        }

        let dir = store.metal_dir(MetalLabel::Silver);
        assert_eq!(
            stored,
            vec![
                dir.join("chain.jpg"),
                dir.join("chain-1.jpg"),
                dir.join("chain-2.jpg")
            ]
        );
        assert_eq!(std::fs::read(dir.join("chain.jpg")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_persist_rejects_bad_name_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::new(temp_dir.path());

        let staged = store.stage_upload(b"x".to_vec(), "jpg").await.unwrap();
        let staged_path = staged.path().to_path_buf();
        let err = store
            .persist(staged, MetalLabel::Gold, "payload.exe")
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogueError::UnsupportedExtension(_)));
        assert!(!staged_path.exists());
    }
}
