//! Errors from parallel coordination.

/// Errors that can end a coordinator or probe run.
#[derive(Debug, thiserror::Error)]
pub enum ParallelError {
    /// Not a single worker slot could be set up.
    ///
    /// Individual pipe/fork failures only skip their slot; this fires
    /// when every slot failed and there is nobody to do the work.
    #[error("no workers could be started (requested {requested})")]
    NoWorkers {
        /// Number of workers that were asked for.
        requested: u32,
    },

    /// An I/O error in the supervise or drain path.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
