//! Attachment encoding: raw image bytes → base64 `ImageData`.
//!
//! Provider APIs (Gemini, OpenAI, Anthropic) take images as base64 payloads
//! embedded in the JSON request body.

use super::reorder::Attachment;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use tracing::debug;

/// Wrap one attachment for a multimodal chat message.
///
/// `detail: "high"` keeps fine print legible for providers that tile images.
pub fn encode_attachment(attachment: &Attachment) -> ImageData {
    let b64 = STANDARD.encode(&attachment.bytes);
    debug!(
        "Encoded {} attachment → {} bytes base64",
        attachment.mime_type,
        b64.len()
    );
    ImageData::new(b64, attachment.mime_type.as_str()).with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_bytes_and_keeps_mime() {
        let att = Attachment {
            mime_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
        };
        let data = encode_attachment(&att);
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), att.bytes);
    }
}
