//! Pure text normalization and segmentation. No I/O: a straight function
//! from raw agent text to a sequence of indexed, boundary-aware segments.

use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct ShapeOptions {
    pub max_segment_chars: usize,
    pub max_segments: usize,
    pub max_total_chars: usize,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            max_segment_chars: 500,
            max_segments: 20,
            max_total_chars: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub index: usize,
    pub text: String,
    pub continuation: bool,
}

#[derive(Debug, Clone)]
pub struct Shaped {
    pub segments: Vec<Segment>,
    pub truncated: bool,
}

/// Remove ASCII control bytes except `\n \r \t`, unify line endings, collapse
/// runs of 3+ newlines to exactly 2, and trim. Idempotent:
/// `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .chars()
        .filter(|&c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
        .collect();

    let unified = stripped.replace("\r\n", "\n").replace('\r', "\n");

    let mut collapsed = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    for c in unified.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                collapsed.push(c);
            }
        } else {
            newline_run = 0;
            collapsed.push(c);
        }
    }

    collapsed.trim().to_string()
}

/// Full pipeline: normalize, truncate, segment.
pub fn shape(raw_text: &str, opts: ShapeOptions) -> Shaped {
    let normalized = normalize(raw_text);

    let (body, truncated) = if normalized.chars().count() > opts.max_total_chars {
        let prefix: String = normalized.chars().take(opts.max_total_chars).collect();
        (prefix, true)
    } else {
        (normalized, false)
    };

    let segments = segment(&body, opts);
    Shaped { segments, truncated }
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    // Split on runs of 2+ newlines (post-normalization the run is exactly 2).
    let re = paragraph_boundary();
    re.split(text).filter(|p| !p.is_empty()).collect()
}

fn paragraph_boundary() -> &'static regex::Regex {
    use once_cell::sync::Lazy;
    static RE: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\n\n+").unwrap());
    &RE
}

fn sentence_end_positions(text: &str) -> impl Iterator<Item = usize> + '_ {
    let bytes = text.as_bytes();
    (0..bytes.len()).filter(move |&i| {
        matches!(bytes[i], b'.' | b'!' | b'?')
            && (i + 1 == bytes.len() || bytes[i + 1] == b' ' || bytes[i + 1] == b'\n')
    })
}

fn segment(text: &str, opts: ShapeOptions) -> Vec<Segment> {
    let mut out = Vec::new();

    'paragraphs: for paragraph in split_paragraphs(text) {
        if paragraph.chars().count() <= opts.max_segment_chars {
            if out.len() >= opts.max_segments {
                break;
            }
            out.push(Segment {
                index: out.len(),
                text: paragraph.to_string(),
                continuation: false,
            });
            continue;
        }

        let mut remaining = paragraph;
        let mut first_chunk_of_paragraph = true;
        while !remaining.is_empty() {
            if out.len() >= opts.max_segments {
                break 'paragraphs;
            }

            let limit_chars = opts.max_segment_chars;
            let char_count = remaining.chars().count();
            if char_count <= limit_chars {
                out.push(Segment {
                    index: out.len(),
                    text: remaining.to_string(),
                    continuation: !first_chunk_of_paragraph,
                });
                break;
            }

            let cut = find_cut_point(remaining, limit_chars);
            let (chunk, rest) = remaining.split_at(cut);
            out.push(Segment {
                index: out.len(),
                text: chunk.trim_end().to_string(),
                continuation: !first_chunk_of_paragraph,
            });
            first_chunk_of_paragraph = false;
            remaining = rest.trim_start();
        }
    }

    out
}

/// Find a byte offset at or before the `limit_chars`-th character, preferring
/// (1) a sentence boundary in the back half of the window, (2) the last
/// whitespace at or after 30% of the window, (3) a hard cut at the limit.
fn find_cut_point(text: &str, limit_chars: usize) -> usize {
    let limit_byte = char_boundary_at(text, limit_chars);
    let back_half_start_chars = limit_chars / 2;
    let back_half_start_byte = char_boundary_at(text, back_half_start_chars);

    if let Some(pos) = sentence_end_positions(&text[..limit_byte])
        .filter(|&p| p >= back_half_start_byte)
        .last()
    {
        return (pos + 1).min(text.len());
    }

    let thirty_pct_byte = char_boundary_at(text, (limit_chars * 3) / 10);
    if let Some(rel) = text[thirty_pct_byte..limit_byte].rfind(char::is_whitespace) {
        return thirty_pct_byte + rel + 1;
    }

    limit_byte
}

fn char_boundary_at(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let raw = "hi\r\nthere\r\r\r\n\n\nbye   ";
        let once = normalize(raw);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_strips_control_bytes_but_keeps_tabs_and_newlines() {
        let raw = "a\u{0007}b\tc\nd";
        assert_eq!(normalize(raw), "ab\tc\nd");
    }

    #[test]
    fn normalize_collapses_excess_blank_lines() {
        let raw = "para one\n\n\n\npara two";
        assert_eq!(normalize(raw), "para one\n\npara two");
    }

    #[test]
    fn short_text_is_single_non_continuation_segment() {
        let shaped = shape("hello world", ShapeOptions::default());
        assert_eq!(shaped.segments.len(), 1);
        assert_eq!(shaped.segments[0].text, "hello world");
        assert!(!shaped.segments[0].continuation);
        assert!(!shaped.truncated);
    }

    #[test]
    fn paragraphs_become_separate_segments() {
        let text = "first paragraph\n\nsecond paragraph";
        let shaped = shape(text, ShapeOptions::default());
        assert_eq!(shaped.segments.len(), 2);
        assert!(!shaped.segments[0].continuation);
        assert!(!shaped.segments[1].continuation);
    }

    #[test]
    fn long_paragraph_splits_with_continuation_flags() {
        let opts = ShapeOptions {
            max_segment_chars: 40,
            max_segments: 20,
            max_total_chars: 5000,
        };
        let sentence = "This is sentence number ";
        let mut text = String::new();
        for i in 0..10 {
            text.push_str(sentence);
            text.push_str(&i.to_string());
            text.push_str(". ");
        }
        let shaped = shape(text.trim(), opts);
        assert!(shaped.segments.len() > 1);
        assert!(!shaped.segments[0].continuation);
        assert!(shaped.segments[1..].iter().all(|s| s.continuation));
        for s in &shaped.segments {
            assert!(s.text.chars().count() <= opts.max_segment_chars);
        }
    }

    #[test]
    fn indices_are_strictly_increasing_from_zero() {
        let text = "a\n\nb\n\nc\n\nd";
        let shaped = shape(text, ShapeOptions::default());
        for (i, seg) in shaped.segments.iter().enumerate() {
            assert_eq!(seg.index, i);
        }
    }

    #[test]
    fn truncates_past_max_total_chars() {
        let opts = ShapeOptions {
            max_total_chars: 10,
            ..ShapeOptions::default()
        };
        let shaped = shape("0123456789ABCDEF", opts);
        assert!(shaped.truncated);
        let total: usize = shaped.segments.iter().map(|s| s.text.chars().count()).sum();
        assert!(total <= 10);
    }

    #[test]
    fn stops_at_max_segments() {
        let opts = ShapeOptions {
            max_segment_chars: 5,
            max_segments: 2,
            max_total_chars: 5000,
        };
        let text = "aaaaa\n\nbbbbb\n\nccccc\n\nddddd";
        let shaped = shape(text, opts);
        assert_eq!(shaped.segments.len(), 2);
    }
}
