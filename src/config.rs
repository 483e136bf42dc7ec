/// How a worker folds values into its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accumulation {
    /// Fold every value straight into its aggregate.
    Scalar,
    /// Buffer up to `capacity` values per key and fold full buffers with the
    /// lane-wise reducer.
    Batched { capacity: usize },
}

impl Default for Accumulation {
    fn default() -> Self {
        Accumulation::Batched { capacity: 64 }
    }
}

/// Tuning knobs for [`Engine`](crate::engine::Engine).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Size of the worker pool; 1 runs the whole input on one thread.
    pub workers: usize,
    /// Target byte length of a chunk when aggregating a byte slice.
    pub chunk_bytes: usize,
    /// Lines per chunk when aggregating a line stream.
    pub chunk_lines: usize,
    pub accumulation: Accumulation,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            chunk_bytes: 16 * 1024 * 1024,
            chunk_lines: 64 * 1024,
            accumulation: Accumulation::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n.max(1);
        self
    }

    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }

    pub fn with_chunk_lines(mut self, lines: usize) -> Self {
        self.chunk_lines = lines.max(1);
        self
    }

    /// `0` selects scalar accumulation.
    pub fn with_batch_capacity(mut self, capacity: usize) -> Self {
        self.accumulation = match capacity {
            0 => Accumulation::Scalar,
            capacity => Accumulation::Batched { capacity },
        };
        self
    }

    /// Chunk length for an input of `len` bytes: never more than
    /// `chunk_bytes`, and small enough that every worker gets a chunk.
    pub(crate) fn chunk_target(&self, len: usize) -> usize {
        let per_worker = len.div_ceil(self.workers.max(1));
        self.chunk_bytes.min(per_worker).max(1)
    }
}
