//! Filesystem storage for post images.
//!
//! Images live under `<root>/posts/<yyyy>/<mm>/<dd>/<uuid>-<name>.<ext>`. Writes land in a
//! `<uuid>.partial` file first and are renamed into place once the stream completes, so a
//! reader never sees a half-written image. The stored extension comes from the image's
//! leading bytes, never from the client's file name.

use std::error::Error as StdError;
use std::io;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use imagesize::ImageType;
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};
use uuid::Uuid;

const POST_IMAGES_DIR: &str = "posts";
const FALLBACK_STEM: &str = "image";
const PARTIAL_SUFFIX: &str = ".partial";
/// Enough leading bytes to tell every accepted format apart.
const SNIFF_LEN: usize = 32;

/// File name extensions accepted from clients.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("uploaded file exceeds configured body limit")]
    PayloadTooLarge {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file stream failed")]
    PayloadStream {
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a png, jpeg, gif or webp image")]
    NotAnImage,
}

/// Image formats accepted for posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    /// Detects the format from the first bytes of a file.
    pub fn sniff(head: &[u8]) -> Option<Self> {
        match imagesize::image_type(head).ok()? {
            ImageType::Png => Some(Self::Png),
            ImageType::Jpeg => Some(Self::Jpeg),
            ImageType::Gif => Some(Self::Gif),
            ImageType::Webp => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }
}

/// Whether a client-supplied file name carries one of [`IMAGE_EXTENSIONS`].
pub fn has_image_extension(original_name: &str) -> bool {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Relative to the storage root; this is what the `posts.image` column holds.
    pub stored_path: String,
    /// Hex SHA-256 of the contents.
    pub checksum: String,
    pub size_bytes: u64,
    pub format: ImageFormat,
}

#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: PathBuf) -> Result<Self, io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Writes `chunks` as a new post image named after `original_name`.
    ///
    /// Nothing is left on disk when the stream fails, turns out to be empty or is not an
    /// image, nor when the returned future is dropped before it completes.
    pub async fn store_stream<S>(
        &self,
        original_name: &str,
        chunks: S,
    ) -> Result<StoredUpload, UploadStorageError>
    where
        S: Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let partial = self.resolve(&format!(
            "{}/{id}{PARTIAL_SUFFIX}",
            dated_image_dir(now)
        ))?;
        let mut pending = PendingImage::open(partial).await?;

        pin_mut!(chunks);
        while let Some(next) = chunks.next().await {
            let appended = match next {
                Ok(chunk) => pending.append(&chunk).await.map_err(UploadStorageError::from),
                Err(err) => Err(err),
            };
            if let Err(err) = appended {
                pending.abandon().await;
                return Err(err);
            }
        }

        if pending.len == 0 {
            pending.abandon().await;
            return Err(UploadStorageError::EmptyPayload);
        }
        let Some(format) = ImageFormat::sniff(&pending.head) else {
            pending.abandon().await;
            return Err(UploadStorageError::NotAnImage);
        };

        let stored_path = dated_image_path(now, id, original_name, format);
        let target = self.resolve(&stored_path)?;
        let (checksum, size_bytes) = pending.commit(&target).await?;
        debug!(stored_path, size_bytes, checksum, ?format, "image stored");
        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes,
            format,
        })
    }

    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let data = fs::read(self.resolve(stored_path)?).await?;
        Ok(Bytes::from(data))
    }

    /// Missing files count as deleted.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        match fs::remove_file(self.resolve(stored_path)?).await {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        let only_plain_segments = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if stored_path.is_empty() || !only_plain_segments {
            return Err(UploadStorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

/// An image being written to its `.partial` file.
///
/// Dropping it before [`PendingImage::commit`] removes the partial file.
struct PendingImage {
    partial: PathBuf,
    file: Option<fs::File>,
    digest: Sha256,
    head: Vec<u8>,
    len: u64,
    finished: bool,
}

impl PendingImage {
    async fn open(partial: PathBuf) -> io::Result<Self> {
        if let Some(parent) = partial.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = fs::File::create(&partial).await?;
        Ok(Self {
            partial,
            file: Some(file),
            digest: Sha256::new(),
            head: Vec::with_capacity(SNIFF_LEN),
            len: 0,
            finished: false,
        })
    }

    async fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::other("pending image already closed"));
        };
        file.write_all(chunk).await?;
        self.digest.update(chunk);
        let missing = SNIFF_LEN.saturating_sub(self.head.len());
        self.head
            .extend_from_slice(&chunk[..missing.min(chunk.len())]);
        self.len += chunk.len() as u64;
        Ok(())
    }

    async fn commit(mut self, target: &Path) -> io::Result<(String, u64)> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
            file.sync_all().await?;
        }
        fs::rename(&self.partial, target).await?;
        self.finished = true;
        let digest = std::mem::take(&mut self.digest);
        Ok((hex::encode(digest.finalize()), self.len))
    }

    async fn abandon(mut self) {
        self.file.take();
        if let Err(err) = fs::remove_file(&self.partial).await {
            warn!(path = %self.partial.display(), error = %err, "failed to remove partial image");
        }
        self.finished = true;
    }
}

impl Drop for PendingImage {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.file.take();
        match std::fs::remove_file(&self.partial) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                warn!(path = %self.partial.display(), error = %err, "failed to remove partial image");
            }
            _ => debug!(path = %self.partial.display(), "partial image removed"),
        }
    }
}

fn dated_image_dir(now: OffsetDateTime) -> String {
    format!(
        "{POST_IMAGES_DIR}/{:04}/{:02}/{:02}",
        now.year(),
        u8::from(now.month()),
        now.day()
    )
}

fn dated_image_path(now: OffsetDateTime, id: Uuid, original_name: &str, format: ImageFormat) -> String {
    format!(
        "{}/{id}-{}.{}",
        dated_image_dir(now),
        disk_file_stem(original_name),
        format.extension()
    )
}

/// Slugified stem of a client-supplied file name.
fn disk_file_stem(original: &str) -> String {
    Path::new(original)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(slugify)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}
