//! Download backends.
//!
//! Each backend accepts a result url and returns the id it assigned to the
//! download. [`DownloadClients`] routes a delivery mode to its backend.

mod direct;
mod qbittorrent;
mod sabnzbd;
mod types;

pub use direct::DirectHttpClient;
pub use qbittorrent::QBittorrentClient;
pub use sabnzbd::SabnzbdClient;
pub use types::*;
