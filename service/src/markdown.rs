//! Markdown rendering with anchor ids on headings.
//!
//! Headings are emitted as `<hN id="..." class="title is-N">` so pages can
//! link to sections. Ids are derived from the heading text only; repeated
//! headings with the same text get the same id.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};
use unicode_normalization::UnicodeNormalization;

/// Derive an anchor id from heading text.
///
/// NFKD-normalizes, drops anything non-ASCII (which strips diacritics),
/// keeps only word characters, whitespace and hyphens, lowercases, and
/// collapses whitespace/hyphen runs into a single `-`.
#[must_use]
pub fn anchor_id(text: &str) -> String {
    let kept: String = text
        .nfkd()
        .filter(char::is_ascii)
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();

    let mut id = String::with_capacity(kept.len());
    let mut in_separator = false;
    for c in kept.trim().chars() {
        if c == '-' || c.is_whitespace() {
            in_separator = true;
            continue;
        }
        if in_separator {
            id.push('-');
            in_separator = false;
        }
        id.push(c.to_ascii_lowercase());
    }
    // A trailing run of hyphens survives trim(); keep it as one hyphen.
    if in_separator {
        id.push('-');
    }
    id
}

/// Render CommonMark to HTML, adding anchor ids to headings.
#[must_use]
pub fn render_markdown(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut events: Vec<Event<'_>> = Vec::new();
    // (level, inner events, plain text) of the heading being collected
    let mut heading: Option<(u8, Vec<Event<'_>>, String)> = None;

    for event in Parser::new_ext(source, options) {
        if let Some((level, inner, text)) = heading.as_mut() {
            if let Event::End(TagEnd::Heading(_)) = event {
                let mut inner_html = String::new();
                html::push_html(&mut inner_html, inner.drain(..));
                let level = *level;
                let id = anchor_id(text);
                events.push(Event::Html(CowStr::from(format!(
                    "<h{level} id=\"{id}\" class=\"title is-{level}\">{inner_html}</h{level}>\n"
                ))));
                heading = None;
            } else {
                match &event {
                    Event::Text(t) | Event::Code(t) => text.push_str(t),
                    Event::SoftBreak | Event::HardBreak => text.push(' '),
                    _ => {}
                }
                inner.push(event);
            }
            continue;
        }

        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, Vec::new(), String::new()));
            }
            other => events.push(other),
        }
    }

    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, events.into_iter());
    output
}
