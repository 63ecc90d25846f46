//! # hubrelay-settings
//!
//! Configuration for the relay, loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `~/.hubrelay/settings.json` or an explicit path,
//!    deep-merged over defaults
//! 3. **Environment variables**: `HUBRELAY_*` overrides (highest priority)
//!
//! The shared secret is never part of the settings file. It is read
//! from `HUBRELAY_SECRET` by [`load_secret`], and its absence is fatal.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    SECRET_ENV, deep_merge, load_secret, load_secret_from, load_settings_from_path, settings_path,
};
pub use types::*;
