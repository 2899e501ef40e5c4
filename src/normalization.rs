/// Normalizes free text by stripping surrounding whitespace and composing
/// it into Unicode Normalization Form C, so that names typed on different
/// systems compare and measure the same.
///
/// ```
/// use mocap_catalog::normalization::normalize_text;
/// assert_eq!(normalize_text(" e\u{301}chauffement "), "\u{e9}chauffement");
/// ```
pub fn normalize_text(text: impl AsRef<str>) -> String {
    use unicode_normalization::UnicodeNormalization;

    text.as_ref().trim().nfc().collect()
}

/// Normalizes optional text, treating blank text as absent.
pub fn normalize_option(text: Option<impl AsRef<str>>) -> Option<String> {
    text.map(normalize_text).filter(|s| !s.is_empty())
}
