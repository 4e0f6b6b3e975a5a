//! # mosaic-rx
//!
//! The receiving side of the mosaic transfer: TOML configuration and an
//! optional terminal view of the feed slots. The protocol engine itself
//! lives in `mosaic-core`.

pub mod config;
pub mod tui;
