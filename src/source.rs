use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use tracing::debug;

use crate::engine::Engine;
use crate::error::Result;
use crate::store::Summary;

impl Engine {
    /// Memory-maps the file at `path` and aggregates it as one byte slice.
    pub fn aggregate_path(&self, path: impl AsRef<Path>) -> Result<Summary> {
        let file = File::open(path.as_ref())?;
        self.aggregate_file(&file)
    }

    pub fn aggregate_file(&self, file: &File) -> Result<Summary> {
        let len = file.metadata()?.len();
        if len == 0 {
            // zero-length mappings are rejected on some platforms
            return Ok(Summary::default());
        }
        debug!(len, "mapping input");
        // SAFETY: the map is read-only and dropped before returning. The file
        // must not be truncated by another process while it is mapped.
        let mmap = unsafe { Mmap::map(file)? };
        self.aggregate_bytes(&mmap)
    }
}
