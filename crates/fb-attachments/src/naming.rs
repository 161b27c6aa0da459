//! On-disk filenames

use fb_core::UploadedFile;
use uuid::Uuid;

use crate::config::NameStrategy;

/// Characters that are replaced with `-` in stored filenames
pub const UNSAFE_CHARS: [char; 8] = [' ', '"', '\'', '&', '/', '\\', '?', '#'];

/// Replace characters that are unsafe in paths and URLs
pub fn sanitize(name: &str) -> String {
    name.replace(UNSAFE_CHARS, "-")
}

/// Random basename with the given extension (no trailing dot without one)
pub fn unique_name(extension: Option<&str>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    match extension.filter(|e| !e.is_empty()) {
        Some(ext) => format!("{}.{}", id, ext),
        None => id,
    }
}

/// Filename an incoming file is stored under.
///
/// Imported files already carry the name chosen by the importer and are only
/// sanitized.
pub fn file_name(strategy: &NameStrategy, file: &UploadedFile, importing: bool) -> String {
    if importing {
        return sanitize(&file.name);
    }
    match strategy {
        NameStrategy::GenerateUnique => unique_name(file.extension().as_deref()),
        NameStrategy::Custom(generate) => generate(file),
        NameStrategy::KeepSanitized => sanitize(&file.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize("my photo & \"friends\".png"), "my-photo----friends-.png");
        assert_eq!(sanitize("a/b\\c?d#e'f"), "a-b-c-d-e-f");
        assert_eq!(sanitize("plain.txt"), "plain.txt");
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "",
            "   ",
            "we're #1?.jpg",
            "../../etc/passwd",
            "C:\\Users\\me\\file name.doc",
            "ünïcødé & more.gif",
        ];
        for input in inputs {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once);
            assert!(!once.contains(UNSAFE_CHARS));
        }
    }

    #[test]
    fn test_unique_name_keeps_extension() {
        let file = UploadedFile::new("Holiday.JPG", "/tmp/u1");
        let name = file_name(&NameStrategy::GenerateUnique, &file, false);
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 32 + 4);
        assert_ne!(name, file_name(&NameStrategy::GenerateUnique, &file, false));

        let bare = UploadedFile::new("README", "/tmp/u2");
        let name = file_name(&NameStrategy::GenerateUnique, &bare, false);
        assert_eq!(name.len(), 32);
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_custom_generator() {
        let strategy = NameStrategy::custom(|file| format!("custom-{}", file.name));
        let file = UploadedFile::new("a.png", "/tmp/u3");
        assert_eq!(file_name(&strategy, &file, false), "custom-a.png");
    }

    #[test]
    fn test_importing_never_randomises() {
        let file = UploadedFile::new("remote image.png", "/tmp/u4");
        assert_eq!(
            file_name(&NameStrategy::GenerateUnique, &file, true),
            "remote-image.png"
        );
        let strategy = NameStrategy::custom(|_| "ignored".to_string());
        assert_eq!(file_name(&strategy, &file, true), "remote-image.png");
        assert_eq!(
            file_name(&NameStrategy::KeepSanitized, &file, false),
            "remote-image.png"
        );
    }
}
