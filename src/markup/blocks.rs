//! Scanner for `:: key` blocks in a markdown body.
//!
//! ```text
//! Some text.
//!
//! :: gallery ---
//! path: photos/day-1
//! include: "IMG_*.jpg"
//! ---
//!
//! :: map
//! ```
//!
//! A block opens with a line of exactly two or three whitespace-separated
//! fields: `::`, the addin key, and optionally `---`. With `---` the lines up
//! to the next `---` line are the block's YAML payload; without it the block
//! is that single line. Blocks cannot interrupt a paragraph and are not
//! recognised inside fenced code.
//!
//! Each block is cut out of the body and replaced by an HTML comment
//! placeholder on its own, so the markdown renderer sees an HTML block it can
//! later swap for the addin's output.

use super::Addin;

const PLACEHOLDER_PREFIX: &str = "<!--journal-addin:";
const PLACEHOLDER_SUFFIX: &str = "-->";

/// One recognised block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub addin: Addin,
    /// 1-based line of the opening marker within the body.
    pub line: usize,
    /// Raw YAML between the markers; `None` for a bare `:: key` line.
    pub payload: Option<String>,
}

/// A body with its blocks replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedBody {
    pub markdown: String,
    pub blocks: Vec<Block>,
}

pub fn placeholder(index: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{index}{PLACEHOLDER_SUFFIX}")
}

/// Block index of a placeholder produced by [`placeholder`], if `html` is one.
pub fn placeholder_index(html: &str) -> Option<usize> {
    html.trim()
        .strip_prefix(PLACEHOLDER_PREFIX)?
        .strip_suffix(PLACEHOLDER_SUFFIX)?
        .parse()
        .ok()
}

/// Open code fence: marker character and run length.
struct Fence {
    marker: char,
    len: usize,
}

fn fence_marker(line: &str) -> Option<Fence> {
    let trimmed = strip_indent(line)?;
    let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = trimmed.chars().take_while(|c| *c == marker).count();
    (len >= 3).then_some(Fence { marker, len })
}

fn closes(fence: &Fence, line: &str) -> bool {
    match fence_marker(line) {
        Some(f) => {
            f.marker == fence.marker
                && f.len >= fence.len
                && strip_indent(line).is_some_and(|t| t[f.len..].trim().is_empty())
        }
        None => false,
    }
}

/// Strip up to three leading spaces; `None` if the line is indented further.
fn strip_indent(line: &str) -> Option<&str> {
    let spaces = line.chars().take_while(|c| *c == ' ').count();
    let rest = &line[spaces..];
    (spaces <= 3 && !rest.starts_with('\t')).then_some(rest)
}

/// Parse an opening marker line. Returns the addin and whether a payload follows.
fn opening(line: &str) -> Option<(Addin, bool)> {
    let fields: Vec<&str> = strip_indent(line)?.split_whitespace().collect();
    match fields.as_slice() {
        ["::", key] => Addin::from_key(key).map(|a| (a, false)),
        ["::", key, "---"] => Addin::from_key(key).map(|a| (a, true)),
        _ => None,
    }
}

pub fn scan(body: &str) -> ScannedBody {
    let lines: Vec<&str> = body.lines().collect();
    let mut markdown = String::with_capacity(body.len());
    let mut blocks = Vec::new();
    let mut fence: Option<Fence> = None;
    // Start of body counts as a paragraph break.
    let mut after_break = true;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];

        if let Some(open) = &fence {
            if closes(open, line) {
                fence = None;
            }
            push_line(&mut markdown, line);
            after_break = false;
            i += 1;
            continue;
        }

        if let Some(f) = fence_marker(line) {
            fence = Some(f);
            push_line(&mut markdown, line);
            after_break = false;
            i += 1;
            continue;
        }

        if after_break && let Some((addin, has_payload)) = opening(line) {
            let start = i;
            i += 1;
            let payload = has_payload.then(|| {
                let mut yaml = String::new();
                while i < lines.len() {
                    let l = lines[i];
                    i += 1;
                    if l.trim() == "---" {
                        break;
                    }
                    push_line(&mut yaml, l);
                }
                yaml
            });
            blocks.push(Block {
                addin,
                line: start + 1,
                payload,
            });
            markdown.push('\n');
            push_line(&mut markdown, &placeholder(blocks.len() - 1));
            markdown.push('\n');
            after_break = true;
            continue;
        }

        after_break = line.trim().is_empty();
        push_line(&mut markdown, line);
        i += 1;
    }

    ScannedBody { markdown, blocks }
}

fn push_line(buf: &mut String, line: &str) {
    buf.push_str(line);
    buf.push('\n');
}
