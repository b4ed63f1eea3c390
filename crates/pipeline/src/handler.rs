//! Byte handler contract
//!
//! The dispatcher hands each job's bytes to a `BytesHandler`. Any
//! `Fn(&[u8]) + Send + Sync + 'static` closure is a handler.

/// Handles the bytes of one job
///
/// Invoked by at most `workers` tasks in parallel. The slice aliases a pooled
/// buffer that is recycled as soon as the call returns; copy anything that must
/// be kept.
///
/// Handlers run on tokio's blocking pool, so synchronous work (including
/// sleeping or blocking I/O) does not stall the runtime.
pub trait BytesHandler: Send + Sync + 'static {
    /// Process the bytes of one job
    fn handle_bytes(&self, bytes: &[u8]);
}

impl<F> BytesHandler for F
where
    F: Fn(&[u8]) + Send + Sync + 'static,
{
    #[inline]
    fn handle_bytes(&self, bytes: &[u8]) {
        self(bytes)
    }
}
