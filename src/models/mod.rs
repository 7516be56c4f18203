//! Core data models for the photo journal.
//!
//! `Photo` is the wire shape returned by the HTTP API; `PhotoMetadata` is the
//! schema persisted on the media host next to each image.

pub mod metadata;
pub mod photo;
