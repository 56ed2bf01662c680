//! Wire types for the Ynison device-sync protocol.
//!
//! The sync service keeps playback state consistent across a user's devices
//! in real time. It is not a query/response API: a participant first
//! announces *a* state of its own, then observes the session's authoritative
//! state. This module models the three payloads that exchange requires:
//!
//! * [`Handshake`] - the `Sec-WebSocket-Protocol` sub-protocol value sent on
//!   both sockets
//! * [`Redirect`] - the grant returned by the redirector, naming the host
//!   that owns the user's live session
//! * [`StateUpdate`] / [`State`] - the outbound shadow-device announcement
//!   and the inbound state snapshot
//!
//! # Wire Format
//!
//! Redirect grant:
//! ```json
//! {
//!     "redirect_ticket": "abc",
//!     "host": "ynison.example.net"
//! }
//! ```
//!
//! State snapshot (fields this crate consumes):
//! ```json
//! {
//!     "player_state": {
//!         "player_queue": {
//!             "current_playable_index": 0,
//!             "entity_id": "12345",
//!             "entity_type": "PLAYLIST",
//!             "playable_list": [{"playable_id": "67890"}],
//!             "options": {"repeat_mode": "NONE"}
//!         },
//!         "status": {
//!             "paused": false,
//!             "duration_ms": "200000",
//!             "progress_ms": "15000"
//!         }
//!     }
//! }
//! ```
//!
//! The service is gRPC behind a JSON facade, so 64-bit integers may arrive
//! as JSON strings; parsing accepts both forms.

use serde::{Deserialize, Serialize};
use serde_with::{json::JsonString, serde_as, DisplayFromStr, PickFirst};

use crate::{
    device::{Device, DeviceId, DeviceInfo},
    error::{Error, Result},
    uuid::Uuid,
};

/// Sub-protocol handshake, serialized into the `Sec-WebSocket-Protocol`
/// header of both sockets.
///
/// The `Ynison-Device-Info` value is itself JSON embedded in a string;
/// the `Serialize` implementation handles that transparently.
#[serde_as]
#[derive(Clone, Serialize, Debug)]
pub struct Handshake {
    #[serde(rename = "Ynison-Device-Id")]
    pub device_id: DeviceId,

    #[serde_as(as = "JsonString")]
    #[serde(rename = "Ynison-Device-Info")]
    pub device_info: DeviceInfo,

    /// Present only on the sync socket, carrying the ticket obtained from
    /// the redirector.
    #[serde(rename = "Ynison-Redirect-Ticket", skip_serializing_if = "Option::is_none")]
    pub redirect_ticket: Option<String>,
}

impl Handshake {
    /// Protocol revision the service expects in the sub-protocol header.
    pub const VERSION: &'static str = "v2";

    /// Creates the handshake for the redirect negotiation (no ticket).
    #[must_use]
    pub fn new(device: &Device) -> Self {
        Self {
            device_id: device.id.clone(),
            device_info: device.info.clone(),
            redirect_ticket: None,
        }
    }

    /// Creates the handshake for the sync socket, carrying the ticket.
    #[must_use]
    pub fn with_ticket(device: &Device, ticket: impl Into<String>) -> Self {
        Self {
            device_id: device.id.clone(),
            device_info: device.info.clone(),
            redirect_ticket: Some(ticket.into()),
        }
    }

    /// Renders the full `Sec-WebSocket-Protocol` header value.
    ///
    /// # Errors
    ///
    /// Returns `Err` if JSON serialization fails.
    pub fn subprotocol(&self) -> Result<String> {
        Ok(format!(
            "Bearer, {}, {}",
            Self::VERSION,
            serde_json::to_string(self)?
        ))
    }
}

/// Session grant returned by the redirector.
///
/// Both fields are required; a payload missing either is a protocol
/// violation. The ticket is single-use and bound to `host`.
#[derive(Clone, Deserialize, Debug)]
pub struct Redirect {
    pub redirect_ticket: String,
    pub host: String,
}

/// Queue entity kinds.
#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
pub enum EntityType {
    #[default]
    VARIOUS,
    ALBUM,
    ARTIST,
    PLAYLIST,
    RADIO,
    /// Forward compatibility: any value this crate does not know.
    #[serde(other)]
    UNSPECIFIED,
}

/// Queue repeat setting.
#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
pub enum RepeatMode {
    #[default]
    NONE,
    ONE,
    ALL,
    /// Forward compatibility: any value this crate does not know.
    #[serde(other)]
    UNSPECIFIED,
}

/// How the queue was derived from its entity.
#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
pub enum EntityContext {
    #[default]
    BASED_ON_ENTITY_BY_DEFAULT,
    /// Forward compatibility: any value this crate does not know.
    #[serde(other)]
    UNSPECIFIED,
}

/// Marker telling the service a state update must not wrest playback away
/// from the active device.
#[expect(non_camel_case_types)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Serialize, Debug, Hash)]
pub enum ActivityInterception {
    #[default]
    DO_NOT_INTERCEPT_BY_DEFAULT,
}

/// One entry of the playback queue.
///
/// A playable is the service's generic unit of queueable content; only the
/// id is consumed here, everything else is tolerated and ignored.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct Playable {
    pub playable_id: String,

    #[serde(default)]
    pub title: String,
}

/// State version stamp.
///
/// The protocol requires version identifiers on queue and status blocks,
/// but a passive listener never participates in version negotiation.
#[serde_as]
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct Version {
    #[serde(default)]
    pub device_id: DeviceId,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub version: u64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub timestamp_ms: u64,
}

/// Queue options block.
#[derive(Copy, Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct QueueOptions {
    #[serde(default)]
    pub repeat_mode: RepeatMode,
}

/// The playback queue of a session.
#[derive(Clone, Deserialize, Serialize, Debug)]
pub struct PlayerQueue {
    /// Index of the entry currently playing; `-1` means nothing is playing.
    pub current_playable_index: i64,

    #[serde(default)]
    pub entity_id: String,

    #[serde(default)]
    pub entity_type: EntityType,

    #[serde(default)]
    pub playable_list: Vec<Playable>,

    #[serde(default)]
    pub options: QueueOptions,

    #[serde(default)]
    pub entity_context: EntityContext,

    #[serde(default)]
    pub version: Version,

    #[serde(default)]
    pub from_optional: String,
}

/// Playback position and pause state.
#[serde_as]
#[derive(Clone, Deserialize, Serialize, Debug)]
pub struct PlaybackStatus {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub paused: bool,

    #[serde(default = "PlaybackStatus::default_speed")]
    pub playback_speed: f64,

    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub progress_ms: u64,

    #[serde(default)]
    pub version: Version,
}

impl PlaybackStatus {
    fn default_speed() -> f64 {
        1.0
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            duration_ms: 0,
            paused: true,
            playback_speed: Self::default_speed(),
            progress_ms: 0,
            version: Version::default(),
        }
    }
}

/// Queue plus status: the player state of a session.
#[derive(Clone, Deserialize, Serialize, Debug)]
pub struct PlayerState {
    pub player_queue: PlayerQueue,
    pub status: PlaybackStatus,
}

/// Device capability flags in a state announcement.
#[derive(Copy, Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct Capabilities {
    pub can_be_player: bool,
    pub can_be_remote_controller: bool,
    pub volume_granularity: u32,
}

/// Device description in a state announcement.
///
/// Unlike the handshake [`DeviceInfo`], the device kind is a string here.
#[derive(Clone, Eq, PartialEq, Serialize, Debug, Hash)]
pub struct DeviceSpec {
    pub device_id: DeviceId,

    #[serde(rename = "type")]
    pub kind: &'static str,

    pub title: String,
    pub app_name: String,
}

/// Volume block of a state announcement.
#[derive(Copy, Clone, PartialEq, Serialize, Debug)]
pub struct VolumeInfo {
    pub volume: f64,
}

/// The announcing device's self-description.
#[derive(Clone, Serialize, Debug)]
pub struct DeviceState {
    pub capabilities: Capabilities,
    pub info: DeviceSpec,
    pub volume_info: VolumeInfo,

    /// A shadow device observes the session without taking control.
    pub is_shadow: bool,
}

/// The `update_full_state` body of an announcement.
#[derive(Clone, Serialize, Debug)]
pub struct FullState {
    pub player_state: PlayerState,
    pub device: DeviceState,
    pub is_currently_active: bool,
}

/// Full state announcement a device sends after joining.
///
/// Every joining device must announce *a* state before it may observe the
/// session's state. [`StateUpdate::shadow_announcement`] builds the
/// announcement of a passive shadow device: playback capable on paper, but
/// inactive, with an empty queue and a paused, zeroed status block. It
/// carries no playback intent.
#[derive(Clone, Serialize, Debug)]
pub struct StateUpdate {
    pub update_full_state: FullState,

    /// Correlation id, freshly generated per announcement.
    pub rid: Uuid,

    pub player_action_timestamp_ms: u64,
    pub activity_interception_type: ActivityInterception,
}

impl StateUpdate {
    /// Placeholder version stamp for the announced queue.
    ///
    /// The service requires version identifiers but never negotiates them
    /// with a device that only listens; these literals are what web clients
    /// send and are accepted as-is.
    const QUEUE_VERSION: u64 = 9_021_243_204_784_341_000;

    /// Placeholder version stamp for the announced status block.
    const STATUS_VERSION: u64 = 8_321_822_175_199_937_000;

    /// Volume granularity reported by web devices.
    const VOLUME_GRANULARITY: u32 = 16;

    /// Builds the announcement for a passive shadow device.
    #[must_use]
    pub fn shadow_announcement(device: &Device) -> Self {
        Self {
            update_full_state: FullState {
                player_state: PlayerState {
                    player_queue: PlayerQueue {
                        current_playable_index: State::NOTHING_PLAYING,
                        entity_id: String::new(),
                        entity_type: EntityType::VARIOUS,
                        playable_list: Vec::new(),
                        options: QueueOptions {
                            repeat_mode: RepeatMode::NONE,
                        },
                        entity_context: EntityContext::BASED_ON_ENTITY_BY_DEFAULT,
                        version: Version {
                            device_id: device.id.clone(),
                            version: Self::QUEUE_VERSION,
                            timestamp_ms: 0,
                        },
                        from_optional: String::new(),
                    },
                    status: PlaybackStatus {
                        duration_ms: 0,
                        paused: true,
                        playback_speed: 1.0,
                        progress_ms: 0,
                        version: Version {
                            device_id: device.id.clone(),
                            version: Self::STATUS_VERSION,
                            timestamp_ms: 0,
                        },
                    },
                },
                device: DeviceState {
                    capabilities: Capabilities {
                        can_be_player: true,
                        can_be_remote_controller: false,
                        volume_granularity: Self::VOLUME_GRANULARITY,
                    },
                    info: DeviceSpec {
                        device_id: device.id.clone(),
                        kind: device.info.kind.wire_name(),
                        title: Device::TITLE.to_owned(),
                        app_name: device.info.app_name.clone(),
                    },
                    volume_info: VolumeInfo { volume: 0.0 },
                    is_shadow: true,
                },
                is_currently_active: false,
            },
            rid: Uuid::fast_v4(),
            player_action_timestamp_ms: 0,
            activity_interception_type: ActivityInterception::DO_NOT_INTERCEPT_BY_DEFAULT,
        }
    }
}

/// Authoritative session state pushed back by the sync host.
///
/// Received once per call and immutable after receipt. Fields other than
/// `player_state` are tolerated and ignored.
#[derive(Clone, Deserialize, Debug)]
pub struct State {
    pub player_state: PlayerState,
}

impl State {
    /// Sentinel index meaning nothing is playing.
    pub const NOTHING_PLAYING: i64 = -1;

    /// Returns the queue entry currently playing.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - the service's explicit "nothing is playing" signal
    /// * `Ok(Some(playable))` - the entry at the current index
    ///
    /// # Errors
    ///
    /// Returns `Err` if the index points outside the queue, which violates
    /// the protocol.
    pub fn current_playable(&self) -> Result<Option<&Playable>> {
        let queue = &self.player_state.player_queue;
        let index = queue.current_playable_index;

        if index == Self::NOTHING_PLAYING {
            return Ok(None);
        }

        let position = usize::try_from(index)
            .map_err(|_| Error::out_of_range(format!("playable index {index} is negative")))?;

        queue.playable_list.get(position).map(Some).ok_or_else(|| {
            Error::out_of_range(format!(
                "playable index {index} outside queue of {} entries",
                queue.playable_list.len()
            ))
        })
    }

    /// Playback position and pause state of the session.
    #[must_use]
    pub fn status(&self) -> &PlaybackStatus {
        &self.player_state.status
    }
}
