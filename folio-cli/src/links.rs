use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Link { label: &'a str, url: &'a str },
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[([^\]]*)\]\(([^)\s]*)\)").expect("link pattern is valid")
    })
}

/// Splits bot text into plain runs and `[label](url)` links.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut last = 0;

    for caps in link_pattern().captures_iter(text) {
        let (Some(whole), Some(label), Some(url)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Text(&text[last..whole.start()]));
        }
        out.push(Segment::Link {
            label: label.as_str(),
            url: url.as_str(),
        });
        last = whole.end();
    }

    if last < text.len() {
        out.push(Segment::Text(&text[last..]));
    }
    out
}
