//! Local blob storage for files respondents attach to media questions.

use std::error::Error as StdError;
use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use sha2::{Digest, Sha256};
use slug::slugify;
use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

pub type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("stored path escapes the upload root")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file exceeds the request size limit")]
    TooLarge(#[source] BoxError),
    #[error("upload was interrupted")]
    Interrupted(#[source] BoxError),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file size exceeds supported range")]
    SizeOverflow,
}

/// A blob written under the storage root.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Relative to the storage root; this is what a field result keeps in `upload`.
    pub stored_path: String,
    pub checksum: String,
    pub size_bytes: i64,
}

/// The media question an upload answers.
#[derive(Debug, Clone, Copy)]
pub struct UploadSlot {
    pub survey_id: Uuid,
    pub field_id: Uuid,
}

impl UploadSlot {
    fn stored_path(self, original_name: &str) -> String {
        format!(
            "{}/{}/{}-{}",
            self.survey_id,
            self.field_id,
            Uuid::new_v4(),
            sanitize_filename(original_name)
        )
    }
}

#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stream a payload to `<survey>/<field>/<uuid>-<name>`.
    ///
    /// Bytes go to a `.part` sibling that is renamed into place once the stream ends, so
    /// an interrupted or empty upload never leaves a file under its final name.
    pub async fn store_stream<S>(
        &self,
        slot: UploadSlot,
        original_name: &str,
        payload: S,
    ) -> Result<StoredUpload, UploadStorageError>
    where
        S: Stream<Item = Result<Bytes, UploadStorageError>>,
    {
        let stored_path = slot.stored_path(original_name);
        let target = self.resolve(&stored_path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = target.with_extension(partial_extension(&target));

        let written = write_payload(&partial, payload).await;
        let (checksum, size_bytes) = match written {
            Ok(summary) => summary,
            Err(err) => {
                let _ = fs::remove_file(&partial).await;
                return Err(err);
            }
        };
        fs::rename(&partial, &target).await?;

        Ok(StoredUpload {
            stored_path,
            checksum,
            size_bytes,
        })
    }

    /// Remove a stored blob; a file that is already gone counts as removed.
    pub async fn remove(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        match fs::remove_file(self.resolve(stored_path)?).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Absolute path of a stored blob.
    pub fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        let contained = !stored_path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained {
            return Err(UploadStorageError::InvalidPath);
        }
        Ok(self.root.join(relative))
    }
}

fn partial_extension(target: &Path) -> String {
    match target.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{ext}.part"),
        None => "part".to_string(),
    }
}

/// Copy the payload into `path`, returning the hex SHA-256 and byte count.
async fn write_payload<S>(path: &Path, payload: S) -> Result<(String, i64), UploadStorageError>
where
    S: Stream<Item = Result<Bytes, UploadStorageError>>,
{
    let mut file = fs::File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut total: u64 = 0;

    pin_mut!(payload);
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        total = total
            .checked_add(chunk.len() as u64)
            .ok_or(UploadStorageError::SizeOverflow)?;
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if total == 0 {
        return Err(UploadStorageError::EmptyPayload);
    }
    let size = i64::try_from(total).map_err(|_| UploadStorageError::SizeOverflow)?;
    Ok((hex::encode(hasher.finalize()), size))
}

/// `My CV.PDF` becomes `my-cv.pdf`; names with nothing sluggable become `upload`.
fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(slugify)
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "upload".to_string());

    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .map_or_else(|| stem.clone(), |ext| format!("{stem}.{ext}"))
}
