//! File name helpers for exported link files and reports.

/// Makes sure `file_name` ends with `.ext` (case-insensitive).
///
/// A different existing extension is kept and `ext` is appended after it.
/// Surrounding whitespace is trimmed in any case.
pub fn force_file_name_extension(file_name: &str, ext: &str) -> String {
    let file_name = file_name.trim();
    let ext = ext.trim().trim_start_matches('.');
    if ext.is_empty() || has_extension(file_name, ext) {
        return file_name.to_string();
    }

    if file_name.ends_with('.') {
        format!("{file_name}{ext}")
    } else {
        format!("{file_name}.{ext}")
    }
}

/// True if `file_name` ends with `.ext`, ignoring case and surrounding whitespace.
pub fn has_extension(file_name: &str, ext: &str) -> bool {
    let file_name = file_name.trim().to_lowercase();
    let ext = ext.trim().trim_start_matches('.').to_lowercase();
    !ext.is_empty() && file_name.ends_with(&format!(".{ext}"))
}
