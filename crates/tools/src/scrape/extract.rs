//! Tag-based text extraction from rendered HTML.

use std::collections::HashSet;

use scraper::{ElementRef, Html};

/// Subtrees that never contribute text.
const SKIPPED: &[&str] = &["script", "style", "noscript", "template"];

/// Extract the text of every element whose tag is in `tags`.
///
/// Elements are visited in document order. A matching element contributes
/// the text of its whole subtree and is not visited again for nested
/// matches. Links render as `text (href)`. Whitespace runs collapse
/// inside each fragment. Fragments are joined with
/// spaces, then blank and repeated lines are dropped.
pub fn extract_text(html: &str, tags: &[String]) -> String {
    let doc = Html::parse_document(html);
    let wanted: HashSet<String> = tags.iter().map(|t| t.trim().to_ascii_lowercase()).collect();

    let mut parts = Vec::new();
    find_matches(doc.root_element(), &wanted, &mut parts);
    dedup_lines(&parts.join(" "))
}

fn find_matches(el: ElementRef<'_>, wanted: &HashSet<String>, out: &mut Vec<String>) {
    for child in el.children() {
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        if wanted.contains(name) {
            if name == "a" {
                push_link(child, out);
            } else {
                collect_strings(child, out);
            }
        } else {
            find_matches(child, wanted, out);
        }
    }
}

fn collect_strings(el: ElementRef<'_>, out: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text = collapse_lines(text);
            if !text.is_empty() {
                out.push(text);
            }
            continue;
        }
        let Some(child) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child.value().name();
        if SKIPPED.contains(&name) {
            continue;
        }
        if name == "a" {
            push_link(child, out);
        } else {
            collect_strings(child, out);
        }
    }
}

/// `text (href)`, or just the text when the link has no href.
fn push_link(el: ElementRef<'_>, out: &mut Vec<String>) {
    let text = collapse_ws(&el.text().collect::<String>());
    match el.value().attr("href") {
        Some(href) => out.push(format!("{text} ({href})")),
        None if !text.is_empty() => out.push(text),
        None => {}
    }
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace runs on each line; line breaks survive for dedup.
fn collapse_lines(s: &str) -> String {
    s.lines()
        .map(collapse_ws)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim lines, drop empty ones, and keep only the first copy of each.
pub fn dedup_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && seen.insert(*l))
        .collect::<Vec<_>>()
        .join("\n")
}
