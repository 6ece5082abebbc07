/// How far into the buffer a `%PDF-` header may appear. Readers are expected
/// to tolerate leading junk up to this offset.
pub const PDF_HEADER_WINDOW: usize = 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Returns the offset of the `%PDF-` header if it appears within the first
/// [`PDF_HEADER_WINDOW`] bytes.
pub fn find_pdf_header(bytes: &[u8]) -> Option<usize> {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window
        .windows(PDF_MAGIC.len())
        .position(|candidate| candidate == PDF_MAGIC)
}

/// Short, printable description of what the buffer starts with, for error
/// details when the header is missing. Non-printable bytes become `.`.
pub fn describe_head(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "empty body".to_string();
    }
    let preview: String = bytes
        .iter()
        .take(16)
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect();
    format!("body starts with {:?}", preview)
}

/// Safely truncates a UTF-8 string without breaking character boundaries.
/// If `s` length exceeds `max`, returns a string cut at a valid char boundary and appends `suffix`.
/// The resulting string length will be <= max whenever possible (suffix included). If `max` < suffix length,
/// the function returns a safely cut string without suffix, not exceeding `max` bytes.
pub fn safe_truncate_utf8(s: &str, max: usize, suffix: &str) -> String {
    if s.len() <= max {
        return s.to_string();
    }

    if max == 0 {
        return String::new();
    }

    let suffix_len = suffix.len();
    if max <= suffix_len {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        return s[..end].to_string();
    }

    let mut end = max - suffix_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut result = String::with_capacity(end + suffix_len);
    result.push_str(&s[..end]);
    result.push_str(suffix);
    result
}
