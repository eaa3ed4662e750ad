//! Archive entry naming
//!
//! Display names coming from the backend are user-controlled. They are made
//! safe for an archive path with [`sanitize_filename`] and made unique within
//! one archive with [`NameRegistry::deduplicate`].

use std::collections::HashSet;

/// Substitute for a name that is empty after sanitizing
pub const PLACEHOLDER_NAME: &str = "document";

/// Extension assumed for names that carry none
pub const DEFAULT_EXTENSION: &str = ".pdf";

/// Characters that are not allowed in an entry name
const FORBIDDEN_CHARS: [char; 10] = ['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Extensions of formats that are compressed already
const COMPRESSED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "avif", "tif", "tiff",
    // documents
    "pdf", "docx", "xlsx", "pptx", "odt", "ods", "odp", "epub",
    // audio and video
    "mp3", "m4a", "aac", "ogg", "opus", "flac", "mp4", "m4v", "mov", "mkv", "avi", "webm",
    // archives
    "zip", "gz", "tgz", "bz2", "xz", "zst", "7z", "rar",
];

/// Make a display name usable as an archive entry name
///
/// Forbidden characters become `_` and surrounding whitespace is trimmed.
/// A name that ends up empty is replaced by [`PLACEHOLDER_NAME`].
///
/// # Examples
///
/// ```
/// use docflow_client::export::naming::sanitize_filename;
///
/// assert_eq!(sanitize_filename("a|b:c\"d<e>f"), "a_b_c_d_e_f");
/// assert_eq!(sanitize_filename("   "), "document");
/// ```
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if FORBIDDEN_CHARS.contains(&c) { '_' } else { c })
        .collect();

    let trimmed = replaced.trim();
    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Split a name into base and extension (the extension keeps its dot)
///
/// A name without a dot, or whose only dot is the leading one of a hidden
/// file, gets [`DEFAULT_EXTENSION`].
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, DEFAULT_EXTENSION),
    }
}

/// Whether an entry with this name should be stored without compression
///
/// Case-insensitive. Names without an extension are compressed.
pub fn is_already_compressed(name: &str) -> bool {
    let Some(idx) = name.rfind('.') else {
        return false;
    };
    let ext = name[idx + 1..].to_ascii_lowercase();
    COMPRESSED_EXTENSIONS.contains(&ext.as_str())
}

/// Names already used in one archive, compared case-insensitively
#[derive(Debug, Default)]
pub struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize `name`, make it unique, and register the result
    ///
    /// On a case-insensitive collision ` (n)` is appended to the base for the
    /// smallest `n >= 1` still free. The returned name keeps the caller's
    /// casing.
    ///
    /// ```
    /// use docflow_client::export::naming::NameRegistry;
    ///
    /// let mut registry = NameRegistry::new();
    /// assert_eq!(registry.deduplicate("report.pdf"), "report.pdf");
    /// assert_eq!(registry.deduplicate("REPORT.pdf"), "REPORT (1).pdf");
    /// ```
    pub fn deduplicate(&mut self, name: &str) -> String {
        let sanitized = sanitize_filename(name);
        let (base, ext) = split_extension(&sanitized);

        let candidate = format!("{base}{ext}");
        if self.used.insert(candidate.to_lowercase()) {
            return candidate;
        }

        let mut n = 1usize;
        loop {
            let candidate = format!("{base} ({n}){ext}");
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Whether a name (any casing) is registered
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// True when nothing is registered yet
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
