use crate::core::ResourceDescriptor;

pub fn sanitize_filename(filename: &str) -> String {
    // Remove or replace characters that are invalid in filenames
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Filename for the Content-Disposition header of a proxied download,
/// shaped like `{title}_{quality}.{ext}`.
pub fn attachment_filename(descriptor: &ResourceDescriptor, quality: &str) -> String {
    let title = descriptor.title.as_deref().unwrap_or("media");
    let clean: String = title
        .chars()
        .filter(|&c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let clean = clean.trim();
    let base = if clean.is_empty() { "media" } else { clean };

    format!("{}_{}.{}", sanitize_filename(base), quality, descriptor.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(title: Option<&str>, format: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            resolved_url: "https://cdn/video".to_string(),
            format: format.to_string(),
            title: title.map(|s| s.to_string()),
            size_bytes: None,
            duration: None,
            backend_id: "test".to_string(),
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("hello/world"), "hello-world");
        assert_eq!(sanitize_filename("test<>file"), "test__file");
        assert_eq!(sanitize_filename("normal_file.mp4"), "normal_file.mp4");
    }

    #[test]
    fn test_attachment_filename() {
        assert_eq!(
            attachment_filename(&descriptor(Some("My Video: Part 2?"), "mp4"), "720"),
            "My Video Part 2_720.mp4"
        );
        assert_eq!(
            attachment_filename(&descriptor(None, "webm"), "best"),
            "media_best.webm"
        );
        assert_eq!(
            attachment_filename(&descriptor(Some("///"), "mp4"), "best"),
            "media_best.mp4"
        );
    }
}
