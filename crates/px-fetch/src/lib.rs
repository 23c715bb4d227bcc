//! Artifact Downloaders (C4) and Download Orchestrator (C7), spec.md §4.4,
//! §4.7, plus the network configuration and `.netrc` password database of
//! spec.md §6.

pub mod file_downloader;
pub mod local_downloader;
pub mod netrc;
pub mod network;
pub mod orchestrator;
pub mod vcs_downloader;

pub use file_downloader::{download_file, FileDownloadError};
pub use local_downloader::{download_local_project, LocalDownloadError};
pub use netrc::{PasswordDatabase, PasswordEntry};
pub use network::{NetworkConfig, NetworkConfigError};
pub use orchestrator::{download_all, pool_size, DownloadContext, MAX_PARALLEL_DOWNLOADS};
pub use vcs_downloader::{download_vcs, VcsArchiveBuilder, VcsDownloadError};
