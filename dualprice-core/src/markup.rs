//! Depth-aware injection into HTML markup fragments
//!
//! The injector places a content string just inside the closing boundary of
//! the first occurrence of a named wrapper element, skipping over nested
//! elements of the same name. Fragments are treated as opaque strings plus a
//! tag cursor, never a fully parsed tree. Structural mismatches fall back to
//! appending after the whole fragment; original markup is never dropped.

use log::trace;
use nom::character::complete::char;
use nom::combinator::opt;
use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};

use crate::error::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Opener,
    Closer,
    SelfClosing,
}

/// One tag occurrence; `end` is the byte offset just past its '>'.
#[derive(Debug, Clone, PartialEq)]
struct TagEvent<'a> {
    name: &'a str,
    kind: TagKind,
    end: usize,
}

fn tag_name(input: &str) -> IResult<&str, &str> {
    nom::bytes::complete::take_while1(|c: char| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'
    })(input)
}

// Consume the remainder of a tag through its closing '>', honoring quoted
// attribute values that may themselves contain '>'.
fn tag_remainder(input: &str) -> IResult<&str, &str> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'>' => return Ok((&input[i + 1..], &input[..i + 1])),
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += 1;
                }
                if i == bytes.len() {
                    break;
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    Err(Err::Error(Error::new(input, ErrorKind::TakeUntil)))
}

fn html_tag(input: &str) -> IResult<&str, (TagKind, &str)> {
    let (rest, _) = char('<')(input)?;
    let (rest, closer) = opt(char('/'))(rest)?;
    let (rest, name) = tag_name(rest)?;
    let (rest, body) = tag_remainder(rest)?;
    let kind = if closer.is_some() {
        TagKind::Closer
    } else if body[..body.len() - 1].trim_end().ends_with('/') {
        TagKind::SelfClosing
    } else {
        TagKind::Opener
    };
    Ok((rest, (kind, name)))
}

/// Iterates tag occurrences in a fragment, skipping comments and
/// declarations; anything unparseable is treated as text.
struct TagScanner<'a> {
    fragment: &'a str,
    pos: usize,
}

impl<'a> TagScanner<'a> {
    fn new(fragment: &'a str) -> Self {
        Self { fragment, pos: 0 }
    }
}

impl<'a> Iterator for TagScanner<'a> {
    type Item = TagEvent<'a>;

    fn next(&mut self) -> Option<TagEvent<'a>> {
        while let Some(offset) = self.fragment[self.pos..].find('<') {
            let start = self.pos + offset;
            let rest = &self.fragment[start..];
            if rest.starts_with("<!--") {
                match rest.find("-->") {
                    Some(end) => {
                        self.pos = start + end + 3;
                        continue;
                    }
                    None => return None,
                }
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                match rest.find('>') {
                    Some(end) => {
                        self.pos = start + end + 1;
                        continue;
                    }
                    None => return None,
                }
            }
            match html_tag(rest) {
                Ok((remaining, (kind, name))) => {
                    let end = self.fragment.len() - remaining.len();
                    self.pos = end;
                    return Some(TagEvent { name, kind, end });
                }
                Err(_) => {
                    self.pos = start + 1;
                }
            }
        }
        None
    }
}

// Byte offset just past the wrapper's own closing tag: the first opener of
// `wrapper` starts the match, and a depth counter skips nested same-named
// elements.
fn locate_wrapper_close(fragment: &str, wrapper: &str) -> Option<usize> {
    let mut inside = false;
    let mut depth = 0usize;
    for event in TagScanner::new(fragment) {
        if !event.name.eq_ignore_ascii_case(wrapper) {
            continue;
        }
        if !inside {
            if event.kind == TagKind::Opener {
                inside = true;
                depth = 0;
            }
            continue;
        }
        match event.kind {
            TagKind::Opener => depth += 1,
            TagKind::SelfClosing => {}
            TagKind::Closer => {
                if depth == 0 {
                    return Some(event.end);
                }
                depth -= 1;
            }
        }
    }
    None
}

/// Insert `content` just inside the closing tag of the first `wrapper_tag`
/// element of `fragment`.
///
/// Nested same-named elements are skipped via tag-depth matching. When the
/// wrapper (or its exact closing-tag text) cannot be located, the content is
/// appended after the whole fragment instead; the output always contains
/// every byte of the input plus the content exactly once.
pub fn inject_before_closing(fragment: &str, wrapper_tag: &str, content: &str) -> String {
    if let Some(close_end) = locate_wrapper_close(fragment, wrapper_tag) {
        let needle = format!("</{}>", wrapper_tag);
        if let Some(pos) = fragment[..close_end].rfind(&needle) {
            return format!("{}{}{}", &fragment[..pos], content, &fragment[pos..]);
        }
    }
    trace!("{} for <{}>; appending after fragment", SkipReason::StructuralMismatch, wrapper_tag);
    format!("{}{}", fragment, content)
}
