//! Wire protocol types.
//!
//! Submodules:
//! * [`ynison`] - the device-sync protocol spoken over the two WebSocket
//!   sessions (handshake sub-protocol, redirect grant, state announcements
//!   and snapshots)
//! * [`catalog`] - the catalog API surface (download variants, signed
//!   direct links, track metadata, search)
//!
//! All inbound types parse forward-compatibly: unknown fields and unknown
//! enum values are tolerated, never errors. Integers that the sync service
//! encodes as JSON strings are accepted in either representation.

pub mod catalog;
pub mod ynison;
