//! Split a markdown document into block-level elements.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};

const CELL_SEPARATOR: &str = " | ";

/// Ordered block elements of `markdown`: headings, paragraphs, list items,
/// code blocks, block quotes and one element per table row. Whitespace-only
/// elements and raw HTML (including `<!-- image -->` placeholders) are dropped.
#[must_use]
pub fn split_elements(markdown: &str) -> Vec<String> {
    let mut elements = Vec::new();
    let mut current = String::new();

    for event in Parser::new_ext(markdown, Options::ENABLE_TABLES) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                flush(&mut current, &mut elements);
                for _ in 0..level as usize {
                    current.push('#');
                }
                current.push(' ');
            }
            Event::Start(
                Tag::Paragraph
                | Tag::Item
                | Tag::CodeBlock(_)
                | Tag::BlockQuote(_)
                | Tag::List(_)
                | Tag::TableHead
                | Tag::TableRow,
            )
            | Event::End(
                TagEnd::Heading(_)
                | TagEnd::Paragraph
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_)
                | TagEnd::List(_)
                | TagEnd::TableHead
                | TagEnd::TableRow,
            ) => flush(&mut current, &mut elements),
            Event::End(TagEnd::TableCell) => current.push_str(CELL_SEPARATOR),
            Event::Text(text) | Event::Code(text) => current.push_str(&text),
            Event::SoftBreak | Event::HardBreak => current.push('\n'),
            _ => {}
        }
    }
    flush(&mut current, &mut elements);
    elements
}

fn flush(current: &mut String, elements: &mut Vec<String>) {
    let text = current.trim().trim_end_matches(CELL_SEPARATOR.trim()).trim();
    if !text.is_empty() && text.chars().any(|c| c != '#') {
        elements.push(text.to_owned());
    }
    current.clear();
}

/// Read `path` and split it into elements.
///
/// # Errors
///
/// Returns an IO error if the file cannot be read.
pub async fn load_elements(path: &std::path::Path) -> std::io::Result<Vec<String>> {
    let markdown = tokio::fs::read_to_string(path).await?;
    Ok(split_elements(&markdown))
}
