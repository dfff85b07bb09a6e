//! Title-derived filenames for stored documents.

use std::path::{Component, Path, PathBuf};

/// Longest stem kept before the `..` truncation marker.
const MAX_STEM_CHARS: usize = 150;

/// Stem used when a title sanitizes to nothing.
const EMPTY_STEM: &str = "untitled";

/// Turns an authoritative title into a filesystem-safe file stem.
///
/// `\ / : * ? " < > | # &` and control characters become `_`. Titles longer
/// than 150 characters are cut to 150 and suffixed with `..`.
///
/// # Examples
///
/// ```
/// use refcrawler_core::download::sanitize_title;
///
/// assert_eq!(sanitize_title("Cats & Dogs: A/B Tests?"), "Cats _ Dogs_ A_B Tests_");
/// assert_eq!(sanitize_title("   "), "untitled");
/// ```
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    let sanitized: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '&' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() || !is_safe_filename_segment(&sanitized) {
        return EMPTY_STEM.to_string();
    }

    if sanitized.chars().count() > MAX_STEM_CHARS {
        let mut truncated: String = sanitized.chars().take(MAX_STEM_CHARS).collect();
        truncated.push_str("..");
        truncated
    } else {
        sanitized
    }
}

/// Returns `{dir}/{sanitized title}.pdf`.
#[must_use]
pub fn document_path(dir: &Path, title: &str) -> PathBuf {
    dir.join(format!("{}.pdf", sanitize_title(title)))
}

/// Returns `{dir}/{sanitized title} [{sanitized key}].pdf`.
///
/// Used when the plain title name already belongs to another DOI.
#[must_use]
pub fn unique_document_path(dir: &Path, title: &str, key: &str) -> PathBuf {
    dir.join(format!("{} [{}].pdf", sanitize_title(title), sanitize_title(key)))
}

/// Returns the in-progress download path for `key`: `{dir}/.{key}.part`.
#[must_use]
pub fn partial_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!(".{}.part", sanitize_title(key)))
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
