//! File upload plumbing — multipart form assembly and media dispatch.

use crate::types::ChatId;

/// Payload for a file upload via multipart.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// The field name in the multipart form ("photo", "video", "document").
    pub field_name: String,
    /// File name with extension.
    pub file_name: String,
    /// MIME type.
    pub mime_type: String,
    /// Raw file bytes.
    pub data: Vec<u8>,
}

/// Build a multipart form for a file upload alongside text parameters.
pub fn build_upload_form(
    chat_id: &ChatId,
    upload: &FileUpload,
    caption: Option<&str>,
) -> Result<reqwest::multipart::Form, String> {
    let mut form = reqwest::multipart::Form::new().text("chat_id", chat_id.to_string());

    let part = reqwest::multipart::Part::bytes(upload.data.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)
        .map_err(|e| format!("Invalid MIME type: {e}"))?;

    form = form.part(upload.field_name.clone(), part);

    if let Some(c) = caption {
        form = form.text("caption", c.to_string());
    }

    Ok(form)
}

/// Determine the Bot API method name for an upload field.
pub fn upload_method_for_field(field_name: &str) -> &str {
    match field_name {
        "photo" => "sendPhoto",
        "video" => "sendVideo",
        "document" => "sendDocument",
        _ => "sendDocument", // fallback
    }
}

/// Guess MIME type from file extension.
pub fn guess_mime_type(file_name: &str) -> &str {
    let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "gzip" => "application/gzip",
        "txt" => "text/plain",
        "json" => "application/json",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

/// Human-readable file size string.
pub fn format_file_size(bytes: i64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{} B", bytes)
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else {
        format!("{:.2} GB", b / GB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_method_mapping() {
        assert_eq!(upload_method_for_field("photo"), "sendPhoto");
        assert_eq!(upload_method_for_field("video"), "sendVideo");
        assert_eq!(upload_method_for_field("document"), "sendDocument");
        assert_eq!(upload_method_for_field("unknown"), "sendDocument");
    }

    #[test]
    fn mime_type_guessing() {
        assert_eq!(guess_mime_type("photo.jpg"), "image/jpeg");
        assert_eq!(guess_mime_type("photo.JPEG"), "image/jpeg");
        assert_eq!(guess_mime_type("clip.mp4"), "video/mp4");
        assert_eq!(guess_mime_type("doc.pdf"), "application/pdf");
        assert_eq!(guess_mime_type("archive.zip"), "application/zip");
        assert_eq!(guess_mime_type("unknown"), "application/octet-stream");
    }

    #[test]
    fn file_size_formatting() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1048576), "1.0 MB");
        assert_eq!(format_file_size(1073741824), "1.00 GB");
    }

    #[test]
    fn build_upload_form_with_caption() {
        let upload = FileUpload {
            field_name: "photo".to_string(),
            file_name: "pic.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            data: vec![0xFF, 0xD8],
        };
        let form = build_upload_form(&ChatId::Numeric(123), &upload, Some("📸 pic.jpg"));
        assert!(form.is_ok());
    }

    #[test]
    fn build_upload_form_minimal() {
        let upload = FileUpload {
            field_name: "document".to_string(),
            file_name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            data: b"hello".to_vec(),
        };
        let form = build_upload_form(&ChatId::Username("@chan".to_string()), &upload, None);
        assert!(form.is_ok());
    }

    #[test]
    fn invalid_mime_rejected() {
        let upload = FileUpload {
            field_name: "document".to_string(),
            file_name: "x".to_string(),
            mime_type: "not a mime".to_string(),
            data: vec![],
        };
        assert!(build_upload_form(&ChatId::Numeric(1), &upload, None).is_err());
    }
}
