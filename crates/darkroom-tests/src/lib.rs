//! Integration test crate for the Darkroom loader.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It drives `darkroom-loader` sessions end to end with real files,
//! on-disk thumbnail caches and scripted decoders.

#[cfg(test)]
mod support;


#[cfg(test)]
mod thumbnails;
