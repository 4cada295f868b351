//! Chapter text normalization shared by every adapter.

/// Canonicalize scraped text.
///
/// Line endings become `\n`, non-breaking and ideographic spaces become plain
/// spaces, every line is trimmed, runs of blank lines collapse to one blank
/// line, and the result is trimmed.
pub fn normalize_text(raw: &str) -> String {
    let unified = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{00a0}', '\u{3000}', '\u{2003}'], " ");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim().to_string()
}

/// Drop the first content line when it repeats the chapter title.
pub fn strip_title_line(content: &str, title: &str) -> String {
    let title = title.trim();
    if title.is_empty() {
        return content.to_string();
    }
    match content.split_once('\n') {
        Some((first, rest)) if first.trim() == title => rest.trim().to_string(),
        None if content.trim() == title => String::new(),
        _ => content.to_string(),
    }
}

/// Normalize and de-duplicate the title line in one step.
pub fn clean_chapter_text(raw: &str, title: &str) -> String {
    strip_title_line(&normalize_text(raw), title)
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
