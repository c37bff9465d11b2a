//! Database access layer
//!
//! Settings (key-value) and the verse text table served to the reader UI.

pub mod init;
pub mod settings;
pub mod verses;
