//! Terminal rendering of answers: prose as-is, `$…$` and `\[…\]` math set apart.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    /// Inline math, delimiters stripped.
    Inline(&'a str),
    /// Display math, delimiters stripped.
    Display(&'a str),
}

fn math_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Display first so `\[ $x$ \]` stays one block. `$$…$$` counts as display too.
        Regex::new(r"(?s)\\\[(.+?)\\\]|\$\$(.+?)\$\$|\$([^$\n]+?)\$").expect("static regex")
    })
}

/// Splits `text` into prose and math segments, in order. Empty prose between adjacent
/// math segments is dropped.
pub fn split_math(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in math_pattern().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            out.push(Segment::Text(&text[last..whole.start()]));
        }
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            out.push(Segment::Display(m.as_str().trim()));
        } else if let Some(m) = caps.get(3) {
            out.push(Segment::Inline(m.as_str().trim()));
        }
        last = whole.end();
    }
    if last < text.len() {
        out.push(Segment::Text(&text[last..]));
    }
    out
}

/// Renders an answer for a plain terminal: inline math in `⟨ ⟩`, display math on its own
/// indented lines.
pub fn render_answer(text: &str) -> String {
    let mut out = String::new();
    for seg in split_math(text) {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Inline(m) => {
                out.push('⟨');
                out.push_str(m);
                out.push('⟩');
            }
            Segment::Display(m) => {
                if !out.is_empty() && !out.ends_with('\n') {
                    out.push('\n');
                }
                for line in m.lines() {
                    out.push_str("    ");
                    out.push_str(line.trim());
                    out.push('\n');
                }
            }
        }
    }
    out
}

/// First `max` characters of `s`, with `...` appended when cut.
pub fn preview(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_inline_and_display_math() {
        let segs = split_math(r"The slope is $2x$, so \[ \frac{d}{dx} x^2 = 2x \] holds.");
        assert_eq!(
            segs,
            vec![
                Segment::Text("The slope is "),
                Segment::Inline("2x"),
                Segment::Text(", so "),
                Segment::Display(r"\frac{d}{dx} x^2 = 2x"),
                Segment::Text(" holds."),
            ]
        );
    }

    #[test]
    fn double_dollar_is_display() {
        assert_eq!(split_math("$$a+b$$"), vec![Segment::Display("a+b")]);
    }

    #[test]
    fn plain_text_is_one_segment() {
        assert_eq!(split_math("no math here"), vec![Segment::Text("no math here")]);
        assert!(split_math("").is_empty());
    }

    #[test]
    fn lone_dollar_is_text() {
        assert_eq!(split_math("costs $5"), vec![Segment::Text("costs $5")]);
    }

    #[test]
    fn renders_display_on_own_line() {
        let r = render_answer(r"So \[x = 1\] done, and $y$.");
        assert_eq!(r, "So \n    x = 1\n done, and ⟨y⟩.");
    }

    #[test]
    fn preview_cuts_on_char_boundary() {
        assert_eq!(preview("∫∫∫∫", 2), "∫∫...");
        assert_eq!(preview("short", 300), "short");
    }
}
