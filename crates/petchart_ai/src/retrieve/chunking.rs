use serde::{Deserialize, Serialize};

const PARAGRAPH_SEP: &str = "\n\n";
const PARAGRAPH_SEP_LEN: usize = 2;

/// Sizes are measured in characters, not bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingOptions {
    pub target_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            target_size: 1000,
            overlap: 150,
        }
    }
}

pub(crate) fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn push_windows(out: &mut Vec<String>, paragraph: &str, target: usize, overlap: usize) {
    let chars: Vec<char> = paragraph.chars().collect();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + target).min(chars.len());
        out.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }
}

/// Split text into paragraph-packed chunks of at most `target_size` characters.
///
/// Paragraphs (blank-line separated) are packed greedily. When a paragraph does not fit,
/// the buffer is flushed and the next one starts with the trailing `overlap` characters of
/// the flushed chunk; the carried tail is shortened when it would push the new buffer past
/// `target_size`. A paragraph longer than `target_size` on its own is cut into fixed
/// windows that overlap by `overlap` characters.
pub fn chunk_markdown(text: &str, opts: &ChunkingOptions) -> Vec<String> {
    let target = opts.target_size.max(1);
    let overlap = opts.overlap.min(target - 1);

    let normalized = normalize_text(text);
    let paras = normalized
        .split(PARAGRAPH_SEP)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty());

    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut buf_len = 0usize;

    for p in paras {
        let p_len = char_len(p);

        if !buf.is_empty() && buf_len + PARAGRAPH_SEP_LEN + p_len <= target {
            buf.push_str(PARAGRAPH_SEP);
            buf.push_str(p);
            buf_len += PARAGRAPH_SEP_LEN + p_len;
            continue;
        }

        let tail = if buf.is_empty() {
            String::new()
        } else {
            let flushed = std::mem::take(&mut buf);
            let room = target.saturating_sub(p_len);
            let tail_len = if room > PARAGRAPH_SEP_LEN {
                overlap.min(room - PARAGRAPH_SEP_LEN)
            } else {
                0
            };
            let tail = last_chars(&flushed, tail_len).trim().to_string();
            out.push(flushed);
            tail
        };

        if p_len > target {
            push_windows(&mut out, p, target, overlap);
            buf_len = 0;
            continue;
        }

        if tail.is_empty() {
            buf.push_str(p);
        } else {
            buf.push_str(&tail);
            buf.push_str(PARAGRAPH_SEP);
            buf.push_str(p);
        }
        buf_len = char_len(&buf);
    }

    if !buf.trim().is_empty() {
        out.push(buf);
    }
    out
}
