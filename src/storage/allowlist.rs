use serde::Serialize;

use crate::storage::{StorageError, StorageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Image,
    Video,
    Document,
    Audio,
    Archive,
}

#[derive(Debug, Clone, Copy, Serialize, utoipa::ToSchema)]
pub struct AllowedType {
    #[schema(value_type = String)]
    pub extension: &'static str,
    pub category: FileCategory,
    #[schema(value_type = Vec<String>)]
    pub mime_types: &'static [&'static str],
}

const fn allowed(
    extension: &'static str,
    category: FileCategory,
    mime_types: &'static [&'static str],
) -> AllowedType {
    AllowedType {
        extension,
        category,
        mime_types,
    }
}

pub static ALLOWED_TYPES: &[AllowedType] = &[
    allowed("jpg", FileCategory::Image, &["image/jpeg"]),
    allowed("jpeg", FileCategory::Image, &["image/jpeg"]),
    allowed("png", FileCategory::Image, &["image/png"]),
    allowed("gif", FileCategory::Image, &["image/gif"]),
    allowed("webp", FileCategory::Image, &["image/webp"]),
    allowed("svg", FileCategory::Image, &["image/svg+xml"]),
    allowed("mp4", FileCategory::Video, &["video/mp4"]),
    allowed("webm", FileCategory::Video, &["video/webm"]),
    allowed("mov", FileCategory::Video, &["video/quicktime"]),
    allowed("pdf", FileCategory::Document, &["application/pdf"]),
    allowed("doc", FileCategory::Document, &["application/msword"]),
    allowed(
        "docx",
        FileCategory::Document,
        &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"],
    ),
    allowed("ppt", FileCategory::Document, &["application/vnd.ms-powerpoint"]),
    allowed(
        "pptx",
        FileCategory::Document,
        &["application/vnd.openxmlformats-officedocument.presentationml.presentation"],
    ),
    allowed("xls", FileCategory::Document, &["application/vnd.ms-excel"]),
    allowed(
        "xlsx",
        FileCategory::Document,
        &["application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"],
    ),
    allowed("txt", FileCategory::Document, &["text/plain"]),
    allowed("mp3", FileCategory::Audio, &["audio/mpeg"]),
    allowed("wav", FileCategory::Audio, &["audio/wav", "audio/x-wav"]),
    allowed("ogg", FileCategory::Audio, &["audio/ogg"]),
    allowed(
        "zip",
        FileCategory::Archive,
        &["application/zip", "application/x-zip-compressed"],
    ),
];

/// Lower-cased extension of `file_name`, if it has one.
pub(crate) fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Checks an upload against the allowlist and the size limit.
pub fn validate_upload(
    file_name: &str,
    content_type: &str,
    size: usize,
    limit: usize,
) -> StorageResult<&'static AllowedType> {
    if size == 0 {
        return Err(StorageError::Empty);
    }
    if size > limit {
        return Err(StorageError::TooLarge { size, limit });
    }

    let extension = extension_of(file_name).unwrap_or_default();
    let allowed = ALLOWED_TYPES
        .iter()
        .find(|t| t.extension == extension)
        .ok_or_else(|| StorageError::ExtensionNotAllowed(extension.clone()))?;

    // ignore parameters such as `; charset=utf-8`
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if !allowed.mime_types.contains(&mime.as_str()) {
        return Err(StorageError::ContentTypeMismatch {
            extension,
            content_type: content_type.to_string(),
        });
    }

    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn accepts_matching_type() {
        let t = validate_upload("notes.PDF", "application/pdf", 10, MB).unwrap();
        assert_eq!(t.category, FileCategory::Document);

        let t = validate_upload("readme.txt", "text/plain; charset=utf-8", 10, MB).unwrap();
        assert_eq!(t.extension, "txt");
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(matches!(
            validate_upload("run.exe", "application/octet-stream", 10, MB),
            Err(StorageError::ExtensionNotAllowed(ext)) if ext == "exe"
        ));
        assert!(matches!(
            validate_upload("noextension", "text/plain", 10, MB),
            Err(StorageError::ExtensionNotAllowed(_))
        ));
    }

    #[test]
    fn rejects_spoofed_mime() {
        assert!(matches!(
            validate_upload("photo.png", "application/pdf", 10, MB),
            Err(StorageError::ContentTypeMismatch { .. })
        ));
    }

    #[test]
    fn enforces_size_limit() {
        assert!(matches!(
            validate_upload("photo.png", "image/png", MB + 1, MB),
            Err(StorageError::TooLarge { .. })
        ));
        assert!(validate_upload("photo.png", "image/png", MB, MB).is_ok());
        assert!(matches!(
            validate_upload("photo.png", "image/png", 0, MB),
            Err(StorageError::Empty)
        ));
    }

    #[test]
    fn extension_needs_a_stem() {
        assert_eq!(extension_of(".png"), None);
        assert_eq!(extension_of("a.tar.GZ"), Some(String::from("gz")));
    }
}
