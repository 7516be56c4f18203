//! Metadata codec.
//!
//! The media host only stores metadata as a flat `key=value|key=value` string.
//! Each value is percent-encoded on its own before joining, so free text in a
//! caption or name can never introduce a stray `=` or `|`.
//!
//! Decoding is lenient: a value that fails to decode is kept raw, and missing
//! fields fall back to their defaults instead of failing the whole record.

use crate::models::{metadata::PhotoMetadata, photo::UNKNOWN_UPLOADER};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

pub const CAPTION: &str = "caption";
pub const UPLOADER_ID: &str = "uploaderId";
pub const UPLOADER_NAME: &str = "uploaderName";
pub const UPLOADER_EMAIL: &str = "uploaderEmail";
pub const UPLOADER_AVATAR: &str = "uploaderAvatar";

const PAIR_SEPARATOR: &str = "|";
const KEY_VALUE_SEPARATOR: char = '=';

/// Characters left as-is by URI component encoding.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Avatar host affected by the historical `=` to space mangling.
const LEGACY_AVATAR_HOST: &str = "googleusercontent.com";

static LEGACY_SIZE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s(s[0-9]+-c)\b").expect("legacy avatar pattern is valid"));

/// Encode metadata into the host's delimited representation.
pub fn encode(meta: &PhotoMetadata) -> String {
    [
        (CAPTION, meta.caption.as_str()),
        (UPLOADER_ID, meta.uploader_id.as_str()),
        (UPLOADER_NAME, meta.uploader_name.as_str()),
        (UPLOADER_EMAIL, meta.uploader_email.as_str()),
        (UPLOADER_AVATAR, meta.uploader_avatar.as_str()),
    ]
    .iter()
    .map(|(key, value)| format!("{key}{KEY_VALUE_SEPARATOR}{}", encode_value(value)))
    .collect::<Vec<_>>()
    .join(PAIR_SEPARATOR)
}

/// Decode the metadata object returned by the media host.
///
/// The host returns fields either nested under `custom` or flat; both are
/// accepted. `None` or a non-object value decodes to all defaults.
pub fn decode(context: Option<&Value>) -> PhotoMetadata {
    let empty = Map::new();
    let fields = match context {
        Some(Value::Object(map)) => match map.get("custom") {
            Some(Value::Object(custom)) => custom,
            _ => map,
        },
        _ => &empty,
    };

    let field = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .map(decode_value)
            .unwrap_or_default()
    };

    let uploader_name = field(UPLOADER_NAME);
    PhotoMetadata {
        caption: field(CAPTION),
        uploader_id: field(UPLOADER_ID),
        uploader_name: if uploader_name.is_empty() {
            UNKNOWN_UPLOADER.to_string()
        } else {
            uploader_name
        },
        uploader_email: field(UPLOADER_EMAIL),
        uploader_avatar: repair_legacy_avatar(&field(UPLOADER_AVATAR)),
    }
}

/// Parse a delimited metadata string back into a flat field object, the way
/// the media host exposes it after storing it. Values stay encoded.
#[cfg(test)]
pub(crate) fn parse_pairs(encoded: &str) -> Map<String, Value> {
    encoded
        .split(PAIR_SEPARATOR)
        .filter_map(|pair| pair.split_once(KEY_VALUE_SEPARATOR))
        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
        .collect()
}

fn encode_value(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Percent-decode a single value, keeping the raw text when it is malformed.
fn decode_value(raw: &str) -> String {
    if !has_valid_escapes(raw) {
        return raw.to_string();
    }
    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Every `%` must start a two-digit hex escape.
fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => i += 3,
                _ => return false,
            }
        } else {
            i += 1;
        }
    }
    true
}

/// Older uploads stored avatar URLs with `=` turned into a space, e.g.
/// `.../photo s96-c`. Put the `=` back for the one affected host.
pub fn repair_legacy_avatar(url: &str) -> String {
    if url.contains(LEGACY_AVATAR_HOST) {
        LEGACY_SIZE_TOKEN.replacen(url, 1, "=${1}").into_owned()
    } else {
        url.to_string()
    }
}
