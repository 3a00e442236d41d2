//! Post-processing for text captured from the engine console.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*?>").expect("valid tag pattern"));

const ENGINE_ERROR_PREFIX: &str = "Error: ";

/// Strip hyperlink-style markup from captured console text.
///
/// Only lines that contain a closing tag and a balanced, non-trivial number of
/// angle brackets are rewritten; comparisons such as `a < b` stay intact.
pub fn remove_html(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let opening = line.matches('<').count();
            let closing = line.matches('>').count();
            if line.contains("</") && opening == closing && opening > 1 {
                MARKUP_TAG.replace_all(line, "").into_owned()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop the `Error: ` prefix the engine puts on execution failures.
pub fn trim_error_prefix(message: &str) -> &str {
    message.strip_prefix(ENGINE_ERROR_PREFIX).unwrap_or(message)
}
