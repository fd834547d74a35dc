use std::path::PathBuf;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::warn;

use crate::application::{AppError, AppResult, SnapshotStore};

/// Snapshot store over a directory: one PNG per target id, replaced on
/// every successful check.
pub struct FsSnapshotStore {
    dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::Storage(format!("create snapshot dir: {e}")))?;
        Ok(Self { dir })
    }

    fn path_for(&self, target_id: &str) -> PathBuf {
        self.dir.join(format!("{}.png", sanitize(target_id)))
    }
}

#[async_trait]
impl SnapshotStore for FsSnapshotStore {
    async fn get(&self, target_id: &str) -> AppResult<Option<DynamicImage>> {
        let path = self.path_for(target_id);
        if !path.exists() {
            return Ok(None);
        }
        match image::open(&path) {
            Ok(img) => Ok(Some(img)),
            Err(e) => {
                // a corrupt snapshot just means the next run re-baselines
                warn!(target_id, path = %path.display(), error = %e, "unreadable snapshot, discarding");
                Ok(None)
            }
        }
    }

    async fn put(&self, target_id: &str, image: &DynamicImage) -> AppResult<()> {
        let path = self.path_for(target_id);
        // write-then-rename so a crash mid-write cannot truncate the baseline
        let tmp = path.with_extension("png.tmp");
        image
            .save_with_format(&tmp, image::ImageFormat::Png)
            .map_err(|e| AppError::Storage(format!("write snapshot {}: {e}", path.display())))?;
        std::fs::rename(&tmp, &path)
            .map_err(|e| AppError::Storage(format!("replace snapshot {}: {e}", path.display())))
    }

    async fn remove(&self, target_id: &str) -> AppResult<()> {
        let path = self.path_for(target_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!(
                "remove snapshot {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Target ids come from operator input; keep the file names tame.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
