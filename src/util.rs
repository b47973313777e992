use compact_str::{CompactString, format_compact};

use crate::model::{POST_KIND, SHORT_URL};

/// Extracts the canonical post id from a post url.
///
/// Understands both `…/comments/<id>/…` permalinks and `https://redd.it/<id>` short links.
pub fn post_id_from_url(url: &str) -> Option<CompactString> {
    let url = url.trim();

    if let Some(rest) = url.strip_prefix(SHORT_URL) {
        let id = rest.trim_start_matches('/').split(['/', '?', '#']).next()?;
        return (!id.is_empty()).then(|| format_compact!("{POST_KIND}{id}"));
    }

    let path = url.split(['?', '#']).next()?;
    let mut segments = path.split('/');
    segments.find(|s| *s == "comments")?;
    let id = segments.next().filter(|s| !s.is_empty())?;

    Some(format_compact!("{POST_KIND}{id}"))
}

/// Lines of a plain-text list: trimmed, without blanks and `#` comments.
pub fn list_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}
