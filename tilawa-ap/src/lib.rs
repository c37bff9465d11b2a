//! # Tilawa Audio Player Library (tilawa-ap)
//!
//! Verse-by-verse recitation playback.
//!
//! **Purpose:** Stream one short clip per verse on request, with pause/resume,
//! seeking, autoplay to the next verse, transient-failure retry and stall
//! detection, while never letting two player instances or two conflicting
//! player operations exist at once. Controlled over HTTP, observed over SSE.
//!
//! **Architecture:** A pure state machine (`playback::transition`) driven by a
//! single event loop (`playback::engine`) whose effect runner owns the only
//! player instance.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
