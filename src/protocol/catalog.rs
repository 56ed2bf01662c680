//! Wire types for the catalog API.
//!
//! The catalog resolves a playable id into track metadata and download
//! variants, and signs direct download links.
//!
//! # Wire Format
//!
//! Download variants (`GET /tracks/{id}/download-info`):
//! ```json
//! {
//!     "result": [{
//!         "codec": "mp3",
//!         "bitrateInKbps": 320,
//!         "downloadInfoUrl": "https://storage.example/...",
//!         "direct": false,
//!         "preview": false
//!     }]
//! }
//! ```
//!
//! Link key (`GET <downloadInfoUrl>&format=json`):
//! ```json
//! {
//!     "host": "storage.example",
//!     "path": "/org/12/abcdef",
//!     "ts": "63a1b2c3",
//!     "s": "signature-seed"
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use url::Url;

/// Envelope every catalog API response comes wrapped in.
#[derive(Clone, Deserialize, Debug)]
pub struct Response<T> {
    pub result: T,
}

/// Audio codec of a download variant.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Mp3,
    Aac,
    /// Forward compatibility: any codec this crate does not know.
    #[serde(other)]
    Other,
}

/// One download variant of a track.
#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    #[serde(default)]
    pub codec: Codec,

    #[serde(default)]
    pub bitrate_in_kbps: u32,

    /// Where to fetch the link key for this variant.
    pub download_info_url: Url,

    #[serde(default)]
    pub direct: bool,

    #[serde(default)]
    pub preview: bool,
}

impl DownloadInfo {
    /// Whether this variant can be offered to a caller at all.
    ///
    /// Preview clips are never usable as the resolved track.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.preview && self.codec != Codec::Other
    }
}

/// Key material for building a signed direct link, fetched from a
/// variant's `download_info_url`.
#[derive(Clone, Deserialize, Debug)]
pub struct LinkKey {
    pub host: String,
    pub path: String,
    pub ts: String,
    pub s: String,
}

/// An artist credited on a track.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct Artist {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub name: String,
}

/// Track metadata.
///
/// The catalog serves ids sometimes as numbers and sometimes as strings;
/// both are accepted.
#[serde_as]
#[derive(Clone, Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub id: u64,

    pub title: String,

    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub available: bool,
}

impl Track {
    /// All credited artist names, comma separated.
    #[must_use]
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Track duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// One page of search results.
#[derive(Clone, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,

    #[serde(default)]
    pub per_page: u64,

    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

/// Result of a catalog search, restricted to the track section.
#[derive(Clone, Deserialize, Debug)]
pub struct SearchResult {
    #[serde(default)]
    pub tracks: Option<Page<Track>>,
}
