//! Message body normalisation.
//!
//! Message bodies are authored in a rich-text editor that nests `div`, `font`
//! and Office (`o:p`) wrappers arbitrarily deep. Walking the parsed fragment
//! flattens that into lines of inline HTML joined with `<br>`.

use scraper::{ElementRef, Html, Node};

const BLOCKS: &[&str] = &[
    "div", "p", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "table",
    "tr", "pre",
];
const INLINE_KEPT: &[&str] = &["a", "b", "strong", "i", "em", "u"];
const SKIPPED: &[&str] = &["script", "style", "head", "title", "meta", "link"];

/// Normalise a body fragment into `<br>`-separated inline HTML.
pub fn normalize_fragment(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    let mut lines = Lines::default();
    lines.walk(parsed.root_element());
    lines.finish()
}

#[derive(Default)]
struct Lines {
    done: Vec<String>,
    current: String,
}

impl Lines {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_text(text),
                Node::Element(_) => {
                    if let Some(el) = ElementRef::wrap(child) {
                        self.element(el);
                    }
                }
                _ => {}
            }
        }
    }

    fn element(&mut self, el: ElementRef<'_>) {
        let name = el.value().name().to_ascii_lowercase();
        let name = name.as_str();

        if name == "br" {
            self.break_line();
        } else if name == "img" {
            let attrs = safe_attrs(el, &["src", "alt", "width", "height"]);
            self.current.push_str(&format!("<img{attrs}>"));
        } else if BLOCKS.contains(&name) {
            self.end_line();
            let before = self.done.len();
            self.walk(el);
            let had_text = !self.current.trim().is_empty();
            self.end_line();
            if !had_text && self.done.len() == before {
                self.done.push(String::new());
            }
        } else if INLINE_KEPT.contains(&name) {
            let attrs = if name == "a" {
                safe_attrs(el, &["href", "target", "title"])
            } else {
                String::new()
            };
            self.current.push_str(&format!("<{name}{attrs}>"));
            self.walk(el);
            self.current.push_str(&format!("</{name}>"));
        } else if !SKIPPED.contains(&name) {
            // font, span, o:p and any other wrapper: keep the children only
            self.walk(el);
        }
    }

    fn push_text(&mut self, text: &str) {
        let mut collapsed = String::with_capacity(text.len());
        let mut in_space = false;
        for c in text.chars() {
            if c.is_whitespace() || c == '\u{a0}' {
                if !in_space {
                    collapsed.push(' ');
                }
                in_space = true;
            } else {
                in_space = false;
                match c {
                    '&' => collapsed.push_str("&amp;"),
                    '<' => collapsed.push_str("&lt;"),
                    '>' => collapsed.push_str("&gt;"),
                    _ => collapsed.push(c),
                }
            }
        }
        if self.current.is_empty() || self.current.ends_with(' ') {
            collapsed = collapsed.trim_start().to_string();
        }
        self.current.push_str(&collapsed);
    }

    /// `<br>`: always ends the line, even an empty one.
    fn break_line(&mut self) {
        let line = std::mem::take(&mut self.current);
        self.done.push(line.trim().to_string());
    }

    /// Block boundary: ends the line only if it has content.
    fn end_line(&mut self) {
        if !self.current.trim().is_empty() {
            self.break_line();
        } else {
            self.current.clear();
        }
    }

    fn finish(mut self) -> String {
        self.end_line();

        let mut out: Vec<&str> = Vec::with_capacity(self.done.len());
        for line in &self.done {
            let blank = line.is_empty();
            let prev_blank = out.last().is_some_and(|l| l.is_empty());
            if blank && (out.is_empty() || prev_blank) {
                continue;
            }
            out.push(line);
        }
        while out.last().is_some_and(|l| l.is_empty()) {
            out.pop();
        }
        out.join("<br>")
    }
}

fn safe_attrs(el: ElementRef<'_>, allowed: &[&str]) -> String {
    let mut attrs = String::new();
    for name in allowed {
        let Some(value) = el.value().attr(name) else {
            continue;
        };
        if value.trim_start().to_ascii_lowercase().starts_with("javascript:") {
            continue;
        }
        let escaped = value
            .replace('&', "&amp;")
            .replace('"', "&quot;")
            .replace('<', "&lt;");
        attrs.push_str(&format!(" {name}=\"{escaped}\""));
    }
    attrs
}
