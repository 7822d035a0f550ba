//! Splicing the report fragment into outgoing response bodies
//!
//! Only HTML responses are touched. The fragment goes right before the
//! rightmost `</body>` (case-insensitive) or, when there is none, at the end
//! of the body. Taking the rightmost marker is a heuristic: a literal
//! `</body>` inside a trailing script or comment after the real closing tag
//! wins. That behavior is kept as-is and covered by tests.

use std::borrow::Cow;

const BODY_CLOSE: &[u8] = b"</body>";

/// Whether a declared content type denotes an HTML document
///
/// Parameters such as `charset` are ignored and the media type is compared
/// case-insensitively. A missing header is treated as not HTML.
pub fn is_html_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let media_type = content_type.split(';').next().unwrap_or("").trim();
    media_type
        .as_bytes()
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"text/html"))
}

/// Byte offset of the rightmost `</body>`, ignoring ASCII case
pub fn find_body_close(body: &[u8]) -> Option<usize> {
    if body.len() < BODY_CLOSE.len() {
        return None;
    }
    (0..=body.len() - BODY_CLOSE.len())
        .rev()
        .find(|&pos| body[pos..pos + BODY_CLOSE.len()].eq_ignore_ascii_case(BODY_CLOSE))
}

/// Insert `fragment` into `body` if the response is HTML
///
/// Non-HTML bodies come back borrowed and byte-for-byte unchanged. Works on
/// arbitrary bytes, so bodies that are not valid UTF-8 are handled too.
pub fn maybe_inject_bytes<'a>(
    content_type: Option<&str>,
    body: &'a [u8],
    fragment: &[u8],
) -> Cow<'a, [u8]> {
    if !is_html_content_type(content_type) {
        return Cow::Borrowed(body);
    }

    let mut out = Vec::with_capacity(body.len() + fragment.len());
    match find_body_close(body) {
        Some(pos) => {
            tracing::debug!(position = pos, "injecting report before </body>");
            out.extend_from_slice(&body[..pos]);
            out.extend_from_slice(fragment);
            out.extend_from_slice(&body[pos..]);
        }
        None => {
            tracing::debug!("no </body> marker, appending report");
            out.extend_from_slice(body);
            out.extend_from_slice(fragment);
        }
    }
    Cow::Owned(out)
}

/// String form of [`maybe_inject_bytes`]
pub fn maybe_inject<'a>(content_type: Option<&str>, body: &'a str, fragment: &str) -> Cow<'a, str> {
    if !is_html_content_type(content_type) {
        return Cow::Borrowed(body);
    }

    // The marker is ASCII, so the split point is always a char boundary
    let mut out = String::with_capacity(body.len() + fragment.len());
    match find_body_close(body.as_bytes()) {
        Some(pos) => {
            out.push_str(&body[..pos]);
            out.push_str(fragment);
            out.push_str(&body[pos..]);
        }
        None => {
            out.push_str(body);
            out.push_str(fragment);
        }
    }
    Cow::Owned(out)
}
