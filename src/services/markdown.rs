//! Markdown rendering for the blog editor preview
//!
//! Uses pulldown-cmark with tables, strikethrough, task lists and smart
//! punctuation. Raw HTML in the source is escaped rather than passed
//! through, matching how the public site displays posts.
//!
//! # Example
//!
//! ```
//! use kaizen_admin::services::markdown::MarkdownRenderer;
//!
//! let renderer = MarkdownRenderer::new();
//! let html = renderer.render("# Oss\n\nThis is **bold** text.");
//! assert!(html.contains("<h1>"));
//! assert!(html.contains("<strong>"));
//! ```

use pulldown_cmark::{html, CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Stateless Markdown to HTML renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }

    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_SMART_PUNCTUATION);
        options
    }

    /// Render Markdown text to HTML.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(markdown, Self::options());
        let events = process_events(parser);

        let mut html_output = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut html_output, events.into_iter());
        html_output
    }

    /// Count words of visible text, ignoring markup.
    pub fn word_count(&self, markdown: &str) -> usize {
        Parser::new_ext(markdown, Self::options())
            .filter_map(|event| match event {
                Event::Text(text) | Event::Code(text) => Some(text.split_whitespace().count()),
                _ => None,
            })
            .sum()
    }
}

/// Escape raw HTML and collapse code blocks into a single `<pre><code>` element.
fn process_events(parser: Parser<'_>) -> Vec<Event<'_>> {
    let mut events = Vec::new();
    let mut code: Option<(Option<String>, String)> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                code = Some((lang, String::new()));
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, body)) = code.take() {
                    events.push(Event::Html(code_block(lang.as_deref(), &body).into()));
                }
            }
            Event::Text(text) if code.is_some() => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(&text);
                }
            }
            Event::Html(raw) | Event::InlineHtml(raw) => events.push(Event::Text(raw)),
            other => events.push(other),
        }
    }

    events
}

fn code_block(lang: Option<&str>, body: &str) -> String {
    match lang {
        Some(lang) => format!(
            "<pre><code class=\"language-{}\">{}</code></pre>\n",
            html_escape(lang),
            html_escape(body)
        ),
        None => format!("<pre><code>{}</code></pre>\n", html_escape(body)),
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_heading_and_emphasis() {
        let html = MarkdownRenderer::new().render("## Grading\n\n*kata* and **kumite**");
        assert!(html.contains("<h2>Grading</h2>"));
        assert!(html.contains("<em>kata</em>"));
        assert!(html.contains("<strong>kumite</strong>"));
    }

    #[test]
    fn test_render_table() {
        let md = "| Belt | Rank |\n|------|------|\n| Black | 1st dan |";
        let html = MarkdownRenderer::new().render(md);
        assert!(html.contains("<table>"));
        assert!(html.contains("<td>Black</td>"));
    }

    #[test]
    fn test_fenced_code_gets_language_class() {
        let html = MarkdownRenderer::new().render("```rust\nlet x = 1 < 2;\n```");
        assert!(html.contains("<pre><code class=\"language-rust\">"));
        assert!(html.contains("1 &lt; 2"));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = MarkdownRenderer::new().render("<script>alert(1)</script>\n\nText");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_word_count_ignores_markup() {
        let renderer = MarkdownRenderer::new();
        assert_eq!(renderer.word_count("# Two words\n\n**three more words**"), 5);
        assert_eq!(renderer.word_count(""), 0);
    }
}
