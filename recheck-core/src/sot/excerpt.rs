//! Wide markdown excerpting for PRD/Epic documents
//!
//! Supporting documents can be long; the bundle carries the preamble, the
//! leading metadata section, and the numbered sections `## 1.` through
//! `## 8.` rather than the whole file.

/// Split a markdown document into its preamble and level-2 sections
fn split_level2_sections(text: &str) -> (String, Vec<(String, String)>) {
    let mut pre = String::new();
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut current: Option<(String, String)> = None;

    for line in text.split_inclusive('\n') {
        if line.starts_with("## ") {
            if let Some(section) = current.take() {
                sections.push(section);
            }
            current = Some((line.trim_end_matches('\n').to_string(), line.to_string()));
            continue;
        }

        match current {
            Some((_, ref mut body)) => body.push_str(line),
            None => pre.push_str(line),
        }
    }

    if let Some(section) = current {
        sections.push(section);
    }

    (pre, sections)
}

/// Check whether a section title is one of the numbered sections `1.`-`8.`
fn is_numbered_section(title: &str) -> bool {
    let Some(rest) = title.strip_prefix("## ") else {
        return false;
    };
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('1'..='8'), Some('.'))
    )
}

/// Extract the wide excerpt of a markdown document
///
/// Keeps the preamble, the first level-2 section (usually metadata), and
/// sections numbered 1-8. Everything else (appendices, changelogs) is
/// dropped.
pub fn extract_wide_markdown(text: &str) -> String {
    let (pre, sections) = split_level2_sections(text);
    let mut out = String::new();

    if !pre.trim().is_empty() {
        out.push_str(pre.trim_end());
        out.push_str("\n\n");
    }

    for (i, (title, body)) in sections.iter().enumerate() {
        if i == 0 || is_numbered_section(title) {
            out.push_str(body.trim_end());
            out.push_str("\n\n");
        }
    }

    let mut out = out.trim_end().to_string();
    out.push('\n');
    out
}
