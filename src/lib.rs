//! Private photo journal.
//!
//! Allow-listed users upload, caption, edit and delete photos kept on a
//! remote media host. Caption and uploader identity live in the metadata
//! attached to each image; there is no database of our own.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
