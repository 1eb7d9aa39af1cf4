//! Recipient list parsing
//!
//! The raw recipient field is free text pasted by the user. Parsing is
//! deliberately permissive: the relay is the final judge of address validity.

/// Split a raw recipient blob into candidate addresses
///
/// Candidates are separated by commas or line breaks (`\n` or `\r\n`), trimmed,
/// and kept only when they contain an `@`. Order is preserved and duplicates
/// are kept.
///
/// # Examples
///
/// ```rust
/// use safe_mail::recipients::parse_recipients;
///
/// let parsed = parse_recipients("a@b.com, bad, c@d.com\n e@f.com");
/// assert_eq!(parsed, vec!["a@b.com", "c@d.com", "e@f.com"]);
/// ```
#[must_use]
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|candidate| candidate.contains('@'))
        .map(ToString::to_string)
        .collect()
}
