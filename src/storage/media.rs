/// MIME types accepted for reference image uploads.
pub const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    infer::get(data).map(|kind| kind.mime_type().to_string())
}

pub fn normalize_mime_type(declared: &str) -> String {
    let base = declared.split(';').next().unwrap_or_default().trim().to_lowercase();
    if base == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        base
    }
}

pub fn is_allowed_image_type(mime_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&mime_type)
}

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}
