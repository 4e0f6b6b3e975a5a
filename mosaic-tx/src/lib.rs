//! # mosaic-tx
//!
//! The sending side of the mosaic transfer: configuration, JPEG
//! preparation and the repeat schedule. The splitter, handshake and frame
//! stream come from `mosaic-core`.

pub mod config;
pub mod prepare;
pub mod schedule;
