//! The now-playing resolver.
//!
//! One resolution call is a strictly linear pipeline: generate an ephemeral
//! device identity, negotiate a session redirect, read the session's state
//! snapshot as a shadow device, resolve the current playable through the
//! catalog, and assemble everything into one [`NowPlaying`] value. Socket
//! lifecycle is hidden entirely behind [`Resolver::now_playing`].
//!
//! Every outcome is a value: no error in this module crashes the host
//! process or propagates past the API boundary. Nothing retries
//! internally; a caller that wants resilience re-invokes the whole call.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use url::Url;

use crate::{
    catalog::{self, Catalog},
    config::Config,
    device::Device,
    error::{Error, ErrorKind, Result},
    protocol::{
        catalog::{Codec, Track},
        ynison::{EntityType, Playable, RepeatMode},
    },
    token::Token,
    ynison,
};

/// Caller-visible failure categories.
///
/// Coarser than [`ErrorKind`] on purpose: callers branch on what to do
/// next, not on what exactly broke.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FailureKind {
    /// A step exceeded its time bound.
    Timeout,

    /// The remote payload was malformed or incomplete, or an index pointed
    /// outside the queue.
    ProtocolViolation,

    /// The track exists but has no usable download encoding at any quality.
    NoPlayableVariant,

    /// Transport failure, or a non-protocol error surfaced by the catalog.
    Upstream,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::ProtocolViolation => "protocol violation",
            Self::NoPlayableVariant => "no playable variant",
            Self::Upstream => "upstream error",
        };
        write!(f, "{name}")
    }
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::DeadlineExceeded => Self::Timeout,
            ErrorKind::InvalidArgument | ErrorKind::OutOfRange => Self::ProtocolViolation,
            ErrorKind::NotFound => Self::NoPlayableVariant,
            _ => Self::Upstream,
        }
    }
}

/// A track resolved through the catalog, ready to present or play.
#[derive(Clone, Debug)]
pub struct ResolvedTrack {
    /// Stable catalog id.
    pub id: u64,
    pub title: String,
    pub artists: Vec<String>,
    pub duration: Duration,

    /// Direct download URL of the chosen variant.
    pub url: Url,
    pub codec: Codec,
    pub bitrate_kbps: u32,
}

impl fmt::Display for ResolvedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artists.join(", "), self.title)
    }
}

/// Outcome of one resolution attempt.
///
/// Terminal value returned to the caller; never mutated. `NotPlaying` is a
/// valid, well-formed signal, not an error.
#[derive(Clone, Debug)]
pub enum NowPlaying {
    /// A track is active on one of the account's devices.
    Playing {
        track: ResolvedTrack,
        paused: bool,
        progress: Duration,
        duration: Duration,
        entity_id: String,
        entity_type: EntityType,
        repeat_mode: RepeatMode,
    },

    /// The session exists but nothing is playing.
    NotPlaying,

    /// The resolution failed; `detail` is human-readable context.
    Failed { kind: FailureKind, detail: String },
}

impl NowPlaying {
    #[must_use]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing { .. })
    }
}

/// The result assembler: folds any pipeline error into a `Failed` value.
///
/// This is the single point where component errors merge into the
/// caller-visible outcome.
impl From<Error> for NowPlaying {
    fn from(error: Error) -> Self {
        let kind = FailureKind::from(error.kind);
        warn!("resolution failed: {error}");

        Self::Failed {
            kind,
            detail: error.to_string(),
        }
    }
}

/// Resolves what is currently playing on a Yandex Music account.
///
/// One resolver serves any number of accounts: the credential is passed
/// per call and no state is retained between calls. The only shared
/// resource is outbound network capacity, bounded by the concurrency
/// limit.
pub struct Resolver {
    config: Config,
    catalog: Box<dyn Catalog>,
    permits: Arc<Semaphore>,
}

impl Resolver {
    /// Bitrate the resolver asks the catalog for first.
    const PREFERRED_BITRATE_KBPS: u32 = 320;

    /// Default bound on concurrent resolutions.
    const DEFAULT_CONCURRENCY: usize = 8;

    /// Creates a resolver with the HTTP catalog client.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let catalog = catalog::Client::new(&config)?;
        Ok(Self::with_catalog(config, catalog))
    }

    /// Creates a resolver with a caller-supplied catalog implementation.
    pub fn with_catalog<C>(config: Config, catalog: C) -> Self
    where
        C: Catalog + 'static,
    {
        Self {
            config,
            catalog: Box::new(catalog),
            permits: Arc::new(Semaphore::new(Self::DEFAULT_CONCURRENCY)),
        }
    }

    /// Sets the bound on concurrent resolutions.
    #[must_use]
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(limit));
        self
    }

    /// Resolves the track currently playing for `token`'s account.
    ///
    /// Fully self-contained: opens exactly two sockets in strict sequence,
    /// performs at most one send and one receive on each, and closes both
    /// before returning. Repeating the call simply re-observes current
    /// server state.
    pub async fn now_playing(&self, token: &Token) -> NowPlaying {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => return NowPlaying::from(Error::unavailable(e.to_string())),
        };

        self.resolve(token).await.unwrap_or_else(NowPlaying::from)
    }

    /// Searches the catalog for tracks, subject to the same concurrency
    /// bound as resolutions.
    ///
    /// # Errors
    ///
    /// Returns error if the catalog request fails.
    pub async fn search(&self, token: &Token, query: &str) -> Result<Vec<Track>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::unavailable(e.to_string()))?;

        self.catalog.search(token, query).await
    }

    async fn resolve(&self, token: &Token) -> Result<NowPlaying> {
        let device = Device::generate();
        debug!("resolving now-playing state as device {device}");

        let redirect = ynison::negotiate(&self.config, &device, token).await?;
        let state = ynison::snapshot(&self.config, &device, token, &redirect).await?;

        let Some(playable) = state.current_playable()? else {
            debug!("nothing is playing");
            return Ok(NowPlaying::NotPlaying);
        };

        let track = self.resolve_track(token, playable).await?;
        debug!("now playing: {track}");

        let status = state.status();
        let queue = &state.player_state.player_queue;
        Ok(NowPlaying::Playing {
            paused: status.paused,
            progress: Duration::from_millis(status.progress_ms),
            duration: Duration::from_millis(status.duration_ms),
            entity_id: queue.entity_id.clone(),
            entity_type: queue.entity_type,
            repeat_mode: queue.options.repeat_mode,
            track,
        })
    }

    /// Resolves a playable into a track with a direct download URL.
    async fn resolve_track(&self, token: &Token, playable: &Playable) -> Result<ResolvedTrack> {
        let track_id = playable.playable_id.parse::<u64>().map_err(|e| {
            Error::invalid_argument(format!(
                "playable id {:?} is not a track id: {e}",
                playable.playable_id
            ))
        })?;

        let variants = self
            .catalog
            .download_info(token, track_id, self.config.prefer_high_quality)
            .await
            .map_err(upstream)?;

        let Some(variant) = variants.first() else {
            return Err(Error::not_found(format!(
                "no usable download variant for track {track_id}"
            )));
        };
        if self.config.prefer_high_quality && variant.bitrate_in_kbps < Self::PREFERRED_BITRATE_KBPS
        {
            info!(
                "track {track_id}: {} kbps unavailable, falling back to {} kbps",
                Self::PREFERRED_BITRATE_KBPS,
                variant.bitrate_in_kbps
            );
        }

        let url = self
            .catalog
            .direct_url(token, variant)
            .await
            .map_err(upstream)?;
        let track = self.catalog.track(token, track_id).await.map_err(upstream)?;

        Ok(ResolvedTrack {
            id: track.id,
            title: track.title,
            artists: track
                .artists
                .into_iter()
                .map(|artist| artist.name)
                .collect(),
            duration: Duration::from_millis(track.duration_ms),
            url,
            codec: variant.codec,
            bitrate_kbps: variant.bitrate_in_kbps,
        })
    }
}

/// Re-kinds catalog-side failures as upstream errors.
///
/// Timeouts keep their kind so callers still see them as `Timeout`; the
/// original error is preserved as the source.
fn upstream(error: Error) -> Error {
    if error.kind == ErrorKind::DeadlineExceeded {
        error
    } else {
        Error::unavailable(error)
    }
}
