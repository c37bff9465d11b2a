//! # Tilawa Common Library
//!
//! Shared code for the Tilawa services including:
//! - Verse identity (`VerseKey`, `SurahContext`) and audio URL resolution
//! - Event types (`TilawaEvent` enum) and the `EventBus`
//! - Configuration file resolution
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod verse;

pub use error::{Error, Result};
pub use verse::{verse_count, AudioSource, SurahContext, VerseKey};
