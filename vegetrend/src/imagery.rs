use std::fs;
use std::path::{Path, PathBuf};

use crate::collect::global_variables::image_output_path;
use crate::error::StoreError;

/// Destination for rendered yearly composites.
pub trait ImageStore: Send + Sync {
    /// Persist the PNG for `year` and return where it landed.
    fn store(&self, year: i32, png: &[u8]) -> Result<PathBuf, StoreError>;
}

/// Stores one `satellite_{year}.png` per scanned year under a directory,
/// overwriting the artifact of any previous run for the same year.
pub struct FsImageStore {
    dir: PathBuf,
}

impl FsImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsImageStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for_year(&self, year: i32) -> PathBuf {
        self.dir.join(format!("satellite_{}.png", year))
    }
}

impl Default for FsImageStore {
    fn default() -> Self {
        FsImageStore::new(image_output_path())
    }
}

impl ImageStore for FsImageStore {
    fn store(&self, year: i32, png: &[u8]) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for_year(year);
        fs::write(&path, png).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
