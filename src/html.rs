use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    /// Malformed markup is an error.
    Document,
    /// Malformed markup is kept as text, like `innerHTML` assignment.
    Fragment,
}

/// Parses an HTML document into a fresh [`Dom`].
///
/// This is a forgiving tag-soup parser: unmatched end tags close up to the
/// nearest matching open element, void elements never take children,
/// `<script>`/`<style>` bodies are kept as raw text and `<textarea>` bodies
/// as raw text with entities decoded. Unterminated comments, tags and quoted
/// attribute values are errors.
pub(crate) fn parse_html(html: &str) -> Result<Dom> {
    parse_with_mode(html, ParseMode::Document)
}

/// Parses markup assigned to an element. Never fails on malformed input: a
/// construct that cannot be parsed is kept as text up to the next `<`.
pub(crate) fn parse_fragment(html: &str) -> Result<Dom> {
    parse_with_mode(html, ParseMode::Fragment)
}

fn parse_with_mode(html: &str, mode: ParseMode) -> Result<Dom> {
    let mut dom = Dom::new();

    let mut stack = vec![dom.root];
    let bytes = html.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        if is_markup_start(bytes, i) {
            match parse_markup(&mut dom, &mut stack, html, i) {
                Ok(next) => {
                    i = next;
                    continue;
                }
                Err(_) if mode == ParseMode::Fragment => {}
                Err(err) => return Err(err),
            }
        }

        let text_start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }

        if let Some(text) = html.get(text_start..i) {
            let parent = *stack
                .last()
                .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;
            dom.create_text(parent, unescape_entities(text));
        }
    }

    dom.initialize_form_control_values()?;
    Ok(dom)
}

fn is_markup_start(bytes: &[u8], i: usize) -> bool {
    bytes[i] == b'<'
        && bytes
            .get(i + 1)
            .is_some_and(|b| *b == b'!' || *b == b'/' || b.is_ascii_alphabetic())
}

/// Parses the comment, doctype, end tag or start tag at `at` and returns the
/// index after it. The tree is only touched once the construct is known to
/// be well formed.
fn parse_markup(dom: &mut Dom, stack: &mut Vec<NodeId>, html: &str, at: usize) -> Result<usize> {
    let bytes = html.as_bytes();

    if starts_with_at(bytes, at, b"<!--") {
        let end = find_subslice(bytes, at + 4, b"-->")
            .ok_or_else(|| Error::HtmlParse("unclosed HTML comment".into()))?;
        return Ok(end + 3);
    }

    if starts_with_at(bytes, at, b"<!") {
        let end = find_subslice(bytes, at, b">")
            .ok_or_else(|| Error::HtmlParse("unclosed doctype".into()))?;
        return Ok(end + 1);
    }

    if starts_with_at(bytes, at, b"</") {
        let (tag, next) = parse_end_tag(html, at)?;
        if let Some(pos) = stack.iter().rposition(|node| dom.is_tag(*node, &tag)) {
            stack.truncate(pos.max(1));
        }
        return Ok(next);
    }

    let (tag, attrs, self_closing, next) = parse_start_tag(html, at)?;
    let parent = *stack
        .last()
        .ok_or_else(|| Error::HtmlParse("missing parent element".into()))?;

    if is_raw_text_tag(&tag) && !self_closing {
        let close = find_case_insensitive_end_tag(bytes, next, tag.as_bytes())
            .ok_or_else(|| Error::HtmlParse(format!("unclosed <{tag}>")))?;
        let (_, after_end) = parse_end_tag(html, close)?;

        let node = dom.create_element(parent, tag.clone(), attrs);
        if let Some(body) = html.get(next..close) {
            if !body.is_empty() {
                let body = if decodes_entities(&tag) {
                    unescape_entities(body)
                } else {
                    body.to_string()
                };
                dom.create_text(node, body);
            }
        }
        return Ok(after_end);
    }

    let node = dom.create_element(parent, tag.clone(), attrs);
    if !self_closing && !is_void_tag(&tag) {
        stack.push(node);
    }
    Ok(next)
}

fn parse_start_tag(
    html: &str,
    at: usize,
) -> Result<(String, BTreeMap<String, String>, bool, usize)> {
    let bytes = html.as_bytes();
    let mut i = at;
    if bytes.get(i) != Some(&b'<') {
        return Err(Error::HtmlParse("expected '<'".into()));
    }
    i += 1;

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }

    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid tag name".into()))?
        .to_ascii_lowercase();

    if tag.is_empty() {
        return Err(Error::HtmlParse("empty tag name".into()));
    }

    let mut attrs = BTreeMap::new();
    let mut self_closing = false;

    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(Error::HtmlParse("unclosed start tag".into()));
        }

        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>') {
            self_closing = true;
            i += 2;
            break;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }

        let name = html
            .get(name_start..i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute name".into()))?
            .to_ascii_lowercase();

        if name.is_empty() {
            return Err(Error::HtmlParse(format!("invalid attribute name in <{tag}>")));
        }

        skip_ws(bytes, &mut i);

        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, bytes, &mut i)?
        } else {
            String::new()
        };

        attrs.entry(name).or_insert(value);
    }

    Ok((tag, attrs, self_closing, i))
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize)> {
    let bytes = html.as_bytes();
    let mut i = at;

    if !(bytes.get(i) == Some(&b'<') && bytes.get(i + 1) == Some(&b'/')) {
        return Err(Error::HtmlParse("expected end tag".into()));
    }
    i += 2;
    skip_ws(bytes, &mut i);

    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }

    let tag = html
        .get(tag_start..i)
        .ok_or_else(|| Error::HtmlParse("invalid end tag".into()))?
        .to_ascii_lowercase();

    while i < bytes.len() && bytes[i] != b'>' {
        i += 1;
    }
    if i >= bytes.len() {
        return Err(Error::HtmlParse("unclosed end tag".into()));
    }

    Ok((tag, i + 1))
}

fn parse_attr_value(html: &str, bytes: &[u8], i: &mut usize) -> Result<String> {
    if *i >= bytes.len() {
        return Err(Error::HtmlParse("missing attribute value".into()));
    }

    if bytes[*i] == b'\'' || bytes[*i] == b'"' {
        let quote = bytes[*i];
        *i += 1;
        let start = *i;
        while *i < bytes.len() && bytes[*i] != quote {
            *i += 1;
        }
        if *i >= bytes.len() {
            return Err(Error::HtmlParse("unclosed quoted attribute value".into()));
        }
        let value = html
            .get(start..*i)
            .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
        *i += 1;
        return Ok(unescape_entities(value));
    }

    let start = *i;
    while *i < bytes.len()
        && !bytes[*i].is_ascii_whitespace()
        && bytes[*i] != b'>'
        && !(bytes[*i] == b'/' && bytes.get(*i + 1) == Some(&b'>'))
    {
        *i += 1;
    }

    let value = html
        .get(start..*i)
        .ok_or_else(|| Error::HtmlParse("invalid attribute value".into()))?;
    Ok(unescape_entities(value))
}

fn unescape_entities(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }
    src.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn is_attr_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':' || b == b'@'
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea")
}

fn decodes_entities(tag: &str) -> bool {
    tag == "textarea"
}

pub(crate) fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes
        .get(at..at + needle.len())
        .is_some_and(|window| window == needle)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || from > bytes.len() {
        return None;
    }
    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn find_case_insensitive_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    let mut needle = Vec::with_capacity(tag.len() + 2);
    needle.extend_from_slice(b"</");
    needle.extend(tag.iter().map(|b| b.to_ascii_lowercase()));

    let mut i = from;
    while i + needle.len() <= bytes.len() {
        if bytes[i..i + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(a, b)| a.to_ascii_lowercase() == *b)
        {
            return Some(i);
        }
        i += 1;
    }
    None
}
