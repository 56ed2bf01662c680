//! Headless Yandex Music now-playing resolver.
//!
//! Discovers the track currently playing on an account by joining the
//! Ynison device-sync session as a passive shadow device, then resolves it
//! to full metadata and a direct audio URL through the catalog API.
//!
//! The public entry point is [`resolver::Resolver::now_playing`], a pure
//! call contract from an account credential to a
//! [`resolver::NowPlaying`] outcome.
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod catalog;
pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod protocol;
pub mod resolver;
pub mod token;
pub mod uuid;
pub mod ynison;
