//! Input validation utilities

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Largest accepted image, per file
pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

/// Most files accepted by one upload request
pub const MAX_FILES_PER_UPLOAD: usize = 10;

/// Extensions the gallery lists; anything else is invisible to the site
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Validate an image category
pub fn validate_category(category: &str) -> Result<(), String> {
    if category.is_empty() {
        return Err("Category is required".to_string());
    }

    if category.len() > 64 {
        return Err("Category must be at most 64 characters long".to_string());
    }

    static CATEGORY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = CATEGORY_REGEX
        .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("Failed to compile category regex"));

    if !regex.is_match(category) {
        return Err(
            "Category can only contain lowercase letters, numbers, and hyphens".to_string(),
        );
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Make a value safe to store as S3 user metadata.
///
/// Control whitespace becomes a space, anything outside printable ASCII is
/// dropped and the result is trimmed.
pub fn sanitize_metadata_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\r' | '\n' | '\t') { ' ' } else { c })
        .filter(|c| matches!(c, '\x20'..='\x7E'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Whether a key names an image the gallery should list
pub fn is_image_key(key: &str) -> bool {
    static IMAGE_KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = IMAGE_KEY_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp)$").expect("Failed to compile image key regex")
    });

    regex.is_match(key)
}

/// Extension to store an upload under: from the file name, else from the content type
pub fn image_extension(original_name: &str, content_type: &str) -> Option<String> {
    let from_name = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty());

    let extension = from_name.or_else(|| {
        let subtype = content_type.strip_prefix("image/")?;
        match subtype {
            "jpeg" | "pjpeg" => Some("jpg".to_string()),
            other => Some(other.to_ascii_lowercase()),
        }
    })?;

    IMAGE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

/// Validate one uploaded file. The content type is checked before the size.
pub fn validate_image_file(
    original_name: &str,
    content_type: &str,
    size: usize,
) -> Result<String, String> {
    if !content_type.starts_with("image/") {
        return Err("Only image files are allowed!".to_string());
    }

    let extension = image_extension(original_name, content_type).ok_or_else(|| {
        format!(
            "Unsupported image format for {}. Allowed: {}",
            original_name,
            IMAGE_EXTENSIONS.join(", ")
        )
    })?;

    if size > MAX_FILE_SIZE {
        return Err("File too large. Maximum size is 5MB.".to_string());
    }

    Ok(extension)
}
