//! Image encoding: raw upload bytes → base64 payload for the vision API.
//!
//! The bytes are encoded exactly as uploaded. No resizing, no re-encoding:
//! a handwritten "8" that JPEG recompression smears into a "6" is a wrong
//! quantity on a purchase order.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::ImageFormat;
use tracing::debug;

/// Base64 image plus the MIME type it will be declared as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Standard (RFC 4648, padded) base64 of the original bytes.
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    /// Inline image for an `edgequake_llm` chat message.
    ///
    /// `detail: "high"` makes GPT-4-class models tile the full image; at
    /// `low` small handwriting on a whiteboard photo is unreadable.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type).with_detail("high")
    }

    /// Inverse of [`encode_image`].
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// Encode raw image bytes. Never fails; `image/jpeg` is assumed when the
/// format cannot be sniffed.
pub fn encode_image(bytes: &[u8]) -> EncodedImage {
    let mime_type = match image::guess_format(bytes) {
        Ok(ImageFormat::Png) => "image/png",
        _ => "image/jpeg",
    };
    let data = STANDARD.encode(bytes);
    debug!("Encoded {} image bytes → {} bytes base64", bytes.len(), data.len());
    EncodedImage { data, mime_type }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reproduces_original_bytes() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let inputs: [&[u8]; 5] = [b"", b"a", b"ab", b"abc", &all_bytes];
        for input in inputs {
            let encoded = encode_image(input);
            assert_eq!(encoded.decode().unwrap(), input);
        }
    }

    #[test]
    fn encoding_is_standard_padded_base64() {
        assert_eq!(encode_image(b"ab").data, "YWI=");
        assert_eq!(encode_image(&[0xfb, 0xff]).data, "+/8=");
    }

    #[test]
    fn encoding_is_deterministic() {
        let bytes = b"\xff\xd8\xff\xe0 some jpeg";
        assert_eq!(encode_image(bytes), encode_image(bytes));
    }

    #[test]
    fn mime_type_follows_magic_bytes() {
        assert_eq!(encode_image(b"\x89PNG\r\n\x1a\n").mime_type, "image/png");
        assert_eq!(encode_image(b"\xff\xd8\xff\xe0").mime_type, "image/jpeg");
        assert_eq!(encode_image(b"????").mime_type, "image/jpeg");
    }

    #[test]
    fn image_data_carries_payload() {
        let encoded = encode_image(b"\xff\xd8\xff\xe0");
        let data = encoded.to_image_data();
        assert_eq!(data.mime_type, "image/jpeg");
        assert_eq!(data.data, encoded.data);
    }
}
