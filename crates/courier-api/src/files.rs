use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::Multipart;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Public prefix under which stored files are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

const MAX_EXTENSION_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Attachment,
    GroupPhoto,
    ProfilePicture,
}

impl UploadKind {
    const ALL: [UploadKind; 3] = [Self::Attachment, Self::GroupPhoto, Self::ProfilePicture];

    pub fn dir(self) -> &'static str {
        match self {
            Self::Attachment => "attachments",
            Self::GroupPhoto => "group-photos",
            Self::ProfilePicture => "profile-pictures",
        }
    }
}

/// A file pulled out of a multipart body, not yet stored.
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Flat on-disk storage for uploaded files, one directory per kind.
/// Files are named `{uuid}.{ext}` and referenced as `/uploads/{kind}/{file}`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        for kind in UploadKind::ALL {
            fs::create_dir_all(root.join(kind.dir())).await?;
        }
        info!("Upload directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the upload and returns its public reference.
    pub async fn save(&self, kind: UploadKind, upload: &Upload) -> Result<String> {
        if upload.bytes.is_empty() {
            return Err(ApiError::BadRequest("uploaded file is empty"));
        }
        let ext = upload
            .file_name
            .as_deref()
            .and_then(extension)
            .ok_or(ApiError::BadRequest("uploaded file needs an alphanumeric extension"))?;

        let file_name = format!("{}.{}", Uuid::new_v4(), ext);
        let path = self.root.join(kind.dir()).join(&file_name);
        fs::write(&path, &upload.bytes).await.map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            ApiError::Internal
        })?;

        Ok(format!("{}/{}/{}", UPLOADS_PREFIX, kind.dir(), file_name))
    }

    /// Deletes a stored file by reference. Unknown or already-missing files
    /// are ignored; removal never fails the request that triggered it.
    pub async fn remove(&self, reference: &str) {
        let Some(path) = self.resolve(reference) else {
            warn!("Refusing to remove unrecognised file reference {}", reference);
            return;
        };
        match fs::remove_file(&path).await {
            Ok(()) => info!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("Failed to remove {}: {}", path.display(), e),
        }
    }

    /// Maps a reference back to a path inside the store, accepting only the
    /// exact shape `save` produces.
    fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let rest = reference.strip_prefix(UPLOADS_PREFIX)?.strip_prefix('/')?;
        let (dir, file) = rest.split_once('/')?;
        let kind = UploadKind::ALL.into_iter().find(|k| k.dir() == dir)?;
        let (stem, ext) = file.split_once('.')?;
        stem.parse::<Uuid>().ok()?;
        extension_ok(ext).then(|| self.root.join(kind.dir()).join(file))
    }
}

fn extension_ok(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_EXTENSION_LEN && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    extension_ok(ext).then(|| ext.to_ascii_lowercase())
}

/// Reads a multipart body expected to carry a single file field called `name`.
/// Other fields are skipped.
pub async fn read_file_field(multipart: &mut Multipart, name: &str) -> Result<Upload> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(name) {
            continue;
        }
        let file_name = field.file_name().map(str::to_owned);
        let bytes = field.bytes().await?;
        return Ok(Upload { file_name, bytes });
    }
    Err(ApiError::BadRequest("missing file field"))
}
