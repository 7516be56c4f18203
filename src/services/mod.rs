pub mod cloudinary;
pub mod identity_gate;
pub mod media_host;
#[cfg(test)]
pub mod memory_host;
pub mod metadata_codec;
pub mod photo_gateway;
