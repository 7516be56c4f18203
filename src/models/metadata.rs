//! The metadata schema attached to every stored image.

use serde::{Deserialize, Serialize};

/// The five fields persisted alongside an image on the media host.
///
/// Adding a field here is a schema change: the codec in
/// `services::metadata_codec` encodes exactly these keys.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    pub caption: String,
    pub uploader_id: String,
    pub uploader_name: String,
    pub uploader_email: String,
    pub uploader_avatar: String,
}

impl PhotoMetadata {
    pub fn new(caption: impl Into<String>, uploader: &Uploader) -> Self {
        Self {
            caption: caption.into(),
            uploader_id: uploader.id.clone(),
            uploader_name: uploader.name.clone(),
            uploader_email: uploader.email.clone(),
            uploader_avatar: uploader.avatar.clone(),
        }
    }
}

/// Identity snapshot of the user performing an upload.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Uploader {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}
