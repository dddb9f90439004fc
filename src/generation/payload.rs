//! Base64 image payloads and `data:` URL helpers.

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};

use crate::error::{StudioError, StudioResult};

/// Binary image payload tagged with its MIME type, stored as base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Standard base64 without a `data:` prefix
    pub data: String,
}

/// Raw bytes fetched from a URL along with the advertised content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

impl ImagePayload {
    /// Wrap an already base64-encoded payload.
    pub fn new(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Encode raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(mime_type, general_purpose::STANDARD.encode(bytes))
    }

    /// Encode raw bytes, sniffing the MIME type from the image header.
    pub fn sniff(bytes: &[u8]) -> StudioResult<Self> {
        let format = image::guess_format(bytes)?;
        Ok(Self::from_bytes(format.to_mime_type(), bytes))
    }

    /// Read an image file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> StudioResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| StudioError::io_at("read image", path.display().to_string(), e))?;
        Self::sniff(&bytes).map_err(|e| e.with_context(format!("loading {}", path.display())))
    }

    /// Build a payload from fetched media, falling back to sniffing when the
    /// server did not send an image content type.
    pub fn from_media(media: &FetchedMedia) -> StudioResult<Self> {
        match media.mime_type.as_deref() {
            Some(mime) if mime.starts_with("image/") => Ok(Self::from_bytes(mime, &media.bytes)),
            _ => Self::sniff(&media.bytes),
        }
    }

    /// Parse a `data:<mime>;base64,<data>` URL.
    pub fn from_data_url(url: &str) -> StudioResult<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| StudioError::validation("data_url", "must start with 'data:'", truncate(url)))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| StudioError::validation("data_url", "must be base64 encoded", truncate(url)))?;
        Ok(Self::new(mime_type, data))
    }

    /// Render as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode the base64 data back into bytes.
    pub fn decode_bytes(&self) -> StudioResult<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(self.data.as_bytes())?)
    }
}

/// Strip a leading `data:image/<subtype>;base64,` prefix if present.
pub fn strip_data_url_prefix(value: &str) -> &str {
    let Some(rest) = value.strip_prefix("data:image/") else {
        return value;
    };
    match rest.split_once(";base64,") {
        Some((subtype, data))
            if !subtype.is_empty()
                && subtype
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_') =>
        {
            data
        }
        _ => value,
    }
}

fn truncate(value: &str) -> String {
    value.chars().take(32).collect()
}
