//! Batched output files.
//!
//! Plot outputs come in sets (one file per observable, per peer, ...). A
//! [`FileBatch`] opens the whole set before anything is written and closes it
//! as a unit, so a failed open never leaves a half-written set behind.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{ReportError, Result};

/// A set of output files opened together.
pub struct FileBatch {
    files: Vec<(PathBuf, BufWriter<File>)>,
}

impl FileBatch {
    /// Create every file in `names` under `dir`.
    ///
    /// If any create fails, files already created by this call are removed
    /// and the error is returned.
    pub fn create<I, S>(dir: &Path, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut files = Vec::new();
        for name in names {
            let path = dir.join(name.as_ref());
            match File::create(&path) {
                Ok(f) => files.push((path, BufWriter::new(f))),
                Err(e) => {
                    for (created, writer) in files.drain(..) {
                        drop(writer);
                        let _ = fs::remove_file(&created);
                    }
                    return Err(ReportError::output(path, e));
                }
            }
        }
        log::debug!("opened {} output file(s) in {}", files.len(), dir.display());
        Ok(Self { files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn path(&self, index: usize) -> &Path {
        &self.files[index].0
    }

    /// Write formatted text to file `index`.
    pub fn write(&mut self, index: usize, args: fmt::Arguments<'_>) -> Result<()> {
        let (path, writer) = &mut self.files[index];
        writer
            .write_fmt(args)
            .map_err(|e| ReportError::output(path.clone(), e))
    }

    /// Flush and close every file, returning their paths.
    pub fn finish(self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::with_capacity(self.files.len());
        for (path, mut writer) in self.files {
            writer
                .flush()
                .map_err(|e| ReportError::output(path.clone(), e))?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Create `dir` (and parents) if missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        log::info!("creating output directory {}", dir.display());
    }
    fs::create_dir_all(dir).map_err(|e| ReportError::output(dir, e))
}
