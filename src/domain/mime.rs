//! Extension-based MIME type lookup.

use std::path::Path;

/// Detect a MIME type from the path's extension alone.
///
/// Returns `None` when the path has no extension or the extension is unknown.
pub fn detect_from_path(path: &str) -> Option<String> {
    Path::new(path).extension()?;
    mime_guess::from_path(path).first_raw().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_is_text_markdown() {
        assert_eq!(detect_from_path("README.md").as_deref(), Some("text/markdown"));
        assert_eq!(detect_from_path("docs/guide.md").as_deref(), Some("text/markdown"));
    }

    #[test]
    fn common_types_resolve() {
        assert_eq!(detect_from_path("a/b.txt").as_deref(), Some("text/plain"));
        assert_eq!(detect_from_path("logo.png").as_deref(), Some("image/png"));
    }

    #[test]
    fn unmapped_extensions_are_unknown() {
        assert_eq!(detect_from_path("LICENSE"), None);
        assert_eq!(detect_from_path("archive.zzqx"), None);
        assert_eq!(detect_from_path(".gitkeep"), None);
    }
}
