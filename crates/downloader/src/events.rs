use crate::error::DownloadError;

/// Events posted by the downloader around synchronisation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A synchronisation started.
    Started,
    /// The synchronisation completed.
    Done,
    /// The synchronisation failed.
    Failed(DownloadError),
}
