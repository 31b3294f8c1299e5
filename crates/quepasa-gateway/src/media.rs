// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound attachment helpers: content decoding, remote fetches, message
//! kind selection, and pairing QR rendering.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, Luma};
use qrcode::QrCode;

use quepasa_core::{Attachment, MessageType, QuepasaError};

const QR_MIN_SIZE: u32 = 256;

/// Fallback mime for unknown binary content.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Picks the message kind for an attachment.
///
/// `ogg` audio always goes out as a voice note; other audio only when
/// `compatible_mime_as_audio` is set.
pub fn kind_for_mime(mime: &str, compatible_mime_as_audio: bool) -> MessageType {
    let base = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if base.starts_with("image/") {
        MessageType::Image
    } else if base.starts_with("video/") {
        MessageType::Video
    } else if base == "audio/ogg" || (compatible_mime_as_audio && base.starts_with("audio/")) {
        MessageType::Audio
    } else {
        MessageType::Document
    }
}

/// Best-effort mime from a file extension.
pub fn mime_from_filename(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "3gp" => "video/3gpp",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "csv" => "text/csv",
        "zip" => "application/zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        _ => return None,
    };
    Some(mime)
}

/// Builds an attachment, filling the mime from the filename when absent.
pub fn attachment(content: Vec<u8>, mime: Option<&str>, filename: &str) -> Attachment {
    let mime = mime
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .or_else(|| mime_from_filename(filename))
        .unwrap_or(OCTET_STREAM);
    Attachment {
        mime: mime.to_string(),
        length: content.len() as u64,
        filename: filename.to_string(),
        content: Some(content),
        ..Attachment::default()
    }
}

/// Decodes base64 content, accepting a `data:<mime>;base64,` prefix.
/// Returns the bytes and the mime found in the prefix, if any.
pub fn decode_content(content: &str) -> Result<(Vec<u8>, Option<String>), QuepasaError> {
    let (mime, data) = match content.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| QuepasaError::Validation("malformed data uri".into()))?;
            let mime = header.trim_end_matches(";base64");
            (Some(mime.to_string()).filter(|m| !m.is_empty()), data)
        }
        None => (None, content),
    };
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| QuepasaError::Validation(format!("invalid base64 content: {e}")))?;
    Ok((bytes, mime))
}

/// Fetches a remote attachment. The filename comes from the last path segment.
pub async fn fetch(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<Attachment, QuepasaError> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| QuepasaError::Transport {
            message: format!("attachment download failed: {url}"),
            source: Some(Box::new(e)),
        })?;
    if !response.status().is_success() {
        return Err(QuepasaError::Validation(format!(
            "attachment url returned {}: {url}",
            response.status()
        )));
    }

    let mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .filter(|m| m != OCTET_STREAM);
    let filename = url
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .unwrap_or_default()
        .to_string();
    let bytes = response.bytes().await.map_err(|e| QuepasaError::Transport {
        message: format!("attachment body read failed: {url}"),
        source: Some(Box::new(e)),
    })?;

    let mut attachment = attachment(bytes.to_vec(), mime.as_deref(), &filename);
    attachment.url = url.to_string();
    Ok(attachment)
}

/// Renders a pairing payload as a PNG QR code.
pub fn qr_png(payload: &str) -> Result<Vec<u8>, QuepasaError> {
    let code = QrCode::new(payload.as_bytes())
        .map_err(|e| QuepasaError::Internal(format!("qr encode failed: {e}")))?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build();

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| QuepasaError::Internal(format!("qr png encode failed: {e}")))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_mime_family() {
        assert_eq!(kind_for_mime("image/jpeg", false), MessageType::Image);
        assert_eq!(kind_for_mime("video/mp4", false), MessageType::Video);
        assert_eq!(kind_for_mime("audio/ogg; codecs=opus", false), MessageType::Audio);
        assert_eq!(kind_for_mime("audio/mpeg", false), MessageType::Document);
        assert_eq!(kind_for_mime("audio/mpeg", true), MessageType::Audio);
        assert_eq!(kind_for_mime("application/pdf", true), MessageType::Document);
    }

    #[test]
    fn attachment_mime_falls_back_to_extension_then_octet_stream() {
        assert_eq!(attachment(vec![1], None, "photo.PNG").mime, "image/png");
        assert_eq!(attachment(vec![1], Some(" "), "blob").mime, OCTET_STREAM);
        let explicit = attachment(vec![1, 2], Some("text/plain"), "a.png");
        assert_eq!(explicit.mime, "text/plain");
        assert_eq!(explicit.length, 2);
    }

    #[test]
    fn decodes_plain_and_data_uri_content() {
        let (bytes, mime) = decode_content("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert!(mime.is_none());

        let (bytes, mime) = decode_content("data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(mime.as_deref(), Some("text/plain"));

        assert!(matches!(
            decode_content("not base64!"),
            Err(QuepasaError::Validation(_))
        ));
    }

    #[test]
    fn qr_renders_png() {
        let png = qr_png("2@mock-qr-payload").unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
