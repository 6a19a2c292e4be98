//! Markdown text blocks rendered to styled, wrapped terminal lines.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::ui::theme::Theme;

const CODE_INDENT: &str = "    ";

pub fn render_markup(text: &str, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    let mut writer = MarkupWriter::new(theme, width);
    for event in Parser::new_ext(text, options) {
        writer.event(event);
    }
    writer.finish()
}

struct MarkupWriter<'t> {
    theme: &'t Theme,
    width: usize,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// `Some(n)` for ordered lists (next number), `None` for bullets.
    lists: Vec<Option<u64>>,
    /// Marker for the first line of the current list item.
    item_marker: Option<String>,
    quote_depth: usize,
    code_block: Option<String>,
    link: Option<String>,
}

impl<'t> MarkupWriter<'t> {
    fn new(theme: &'t Theme, width: usize) -> Self {
        Self {
            theme,
            width: width.max(8),
            lines: Vec::new(),
            current: Vec::new(),
            styles: vec![theme.text_style],
            lists: Vec::new(),
            item_marker: None,
            quote_depth: 0,
            code_block: None,
            link: None,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or(self.theme.text_style)
    }

    fn push_style(&mut self, patch: Style) {
        let next = self.style().patch(patch);
        self.styles.push(next);
    }

    fn pop_style(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }

    fn indent(&self) -> String {
        let mut indent = "│ ".repeat(self.quote_depth);
        indent.push_str(&"  ".repeat(self.lists.len().saturating_sub(1)));
        if !self.lists.is_empty() {
            indent.push_str("  ");
        }
        indent
    }

    fn blank_line(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() && self.item_marker.is_none() {
            return;
        }
        let spans = std::mem::take(&mut self.current);
        let indent = self.indent();
        let first_indent = match self.item_marker.take() {
            Some(marker) => {
                let base = indent.chars().count().saturating_sub(2);
                let mut first: String = indent.chars().take(base).collect();
                first.push_str(&marker);
                first
            }
            None => indent.clone(),
        };
        let wrapped = wrap_spans(spans, self.width, &first_indent, &indent);
        self.lines.extend(wrapped);
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if let Some(buffer) = self.code_block.as_mut() {
                    buffer.push_str(&text);
                } else {
                    let style = self.style();
                    self.current.push(Span::styled(text.into_string(), style));
                }
            }
            Event::Code(code) => {
                let style = self.theme.code_style;
                self.current.push(Span::styled(code.into_string(), style));
            }
            Event::SoftBreak => {
                let style = self.style();
                self.current.push(Span::styled(" ", style));
            }
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.blank_line();
                let rule = "─".repeat(self.width.min(40));
                self.lines
                    .push(Line::from(Span::styled(rule, self.theme.meta_style)));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let style = self.theme.meta_style;
                self.current
                    .push(Span::styled(html.trim_end().to_string(), style));
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                let style = self.style();
                self.current.push(Span::styled(marker, style));
            }
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                let style = self.theme.code_style;
                self.current.push(Span::styled(math.into_string(), style));
            }
            Event::FootnoteReference(_) => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Tag::Heading { level, .. } => {
                self.flush();
                self.blank_line();
                let hashes = match level {
                    HeadingLevel::H1 => "",
                    HeadingLevel::H2 => "",
                    _ => "· ",
                };
                self.push_style(self.theme.heading_style);
                if !hashes.is_empty() {
                    let style = self.style();
                    self.current.push(Span::styled(hashes, style));
                }
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.quote_depth += 1;
                self.push_style(self.theme.quote_style);
            }
            Tag::List(start) => {
                self.flush();
                if self.lists.is_empty() {
                    self.blank_line();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{next}. ");
                        *next += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.item_marker = Some(marker);
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                self.blank_line();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("{CODE_INDENT}{lang}"),
                            self.theme.meta_style,
                        )));
                    }
                }
                self.code_block = Some(String::new());
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.into_string());
                self.push_style(self.theme.link_style);
            }
            Tag::Image { dest_url, .. } => {
                let style = self.theme.meta_style;
                self.current
                    .push(Span::styled(format!("[image {dest_url}] "), style));
                self.push_style(self.theme.meta_style);
            }
            Tag::TableCell => {
                let style = self.theme.meta_style;
                self.current.push(Span::styled("│ ", style));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.flush(),
            TagEnd::Heading(_) => {
                self.flush();
                self.pop_style();
            }
            TagEnd::BlockQuote(_) => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.pop_style();
            }
            TagEnd::List(_) => {
                self.flush();
                self.lists.pop();
            }
            TagEnd::Item => self.flush(),
            TagEnd::CodeBlock => {
                let code = self.code_block.take().unwrap_or_default();
                for line in code.lines() {
                    self.lines.push(Line::from(Span::styled(
                        format!("{CODE_INDENT}{line}"),
                        self.theme.code_style,
                    )));
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Image => {
                self.pop_style()
            }
            TagEnd::Link => {
                self.pop_style();
                if let Some(url) = self.link.take() {
                    let style = self.theme.meta_style;
                    self.current.push(Span::styled(format!(" <{url}>"), style));
                }
            }
            TagEnd::TableHead | TagEnd::TableRow => self.flush(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.first().is_some_and(|line| line.width() == 0) {
            self.lines.remove(0);
        }
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Split `text` into alternating runs of whitespace and non-whitespace.
fn tokens(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_space = None;
    for (index, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(previous) if previous != space => {
                out.push(&text[start..index]);
                start = index;
            }
            _ => {}
        }
        in_space = Some(space);
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Word-wrap styled spans. The first line starts with `first_indent`, the
/// rest with `indent`. Words longer than a line are split by width.
pub fn wrap_spans(
    spans: Vec<Span<'static>>,
    width: usize,
    first_indent: &str,
    indent: &str,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut current: Vec<Span<'static>> = vec![Span::raw(first_indent.to_string())];
    let mut used = first_indent.width();

    let mut break_line = |current: &mut Vec<Span<'static>>, used: &mut usize| {
        lines.push(Line::from(std::mem::take(current)));
        current.push(Span::raw(indent.to_string()));
        *used = indent.width();
    };

    for span in spans {
        let style = span.style;
        for token in tokens(&span.content) {
            let token_width = token.width();
            let line_start = current.len() == 1;
            if token.trim().is_empty() {
                if line_start || used + token_width > width {
                    continue;
                }
                current.push(Span::styled(token.to_string(), style));
                used += token_width;
                continue;
            }
            if used + token_width > width && !line_start {
                break_line(&mut current, &mut used);
            }
            if used + token_width <= width {
                current.push(Span::styled(token.to_string(), style));
                used += token_width;
                continue;
            }
            let mut chunk = String::new();
            for ch in token.chars() {
                let ch_width = ch.width().unwrap_or(0);
                if used + ch_width > width && !chunk.is_empty() {
                    current.push(Span::styled(std::mem::take(&mut chunk), style));
                    break_line(&mut current, &mut used);
                }
                chunk.push(ch);
                used += ch_width;
            }
            if !chunk.is_empty() {
                current.push(Span::styled(chunk, style));
            }
        }
    }
    lines.push(Line::from(current));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'static>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                line.spans
                    .iter()
                    .map(|span| span.content.as_ref())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn paragraphs_wrap_at_word_boundaries() {
        let theme = Theme::default();
        let lines = render_markup("alpha beta gamma delta", &theme, 12);
        assert_eq!(plain(&lines), vec!["alpha beta", "gamma delta"]);
    }

    #[test]
    fn headings_and_paragraphs_are_separated() {
        let theme = Theme::default();
        let lines = render_markup("# Results\n\nAll runs *finished*.", &theme, 40);
        assert_eq!(plain(&lines), vec!["Results", "", "All runs finished."]);
        assert_eq!(lines[0].spans[1].style, theme.text_style.patch(theme.heading_style));
    }

    #[test]
    fn lists_get_markers_and_hanging_indent() {
        let theme = Theme::default();
        let lines = render_markup("- one two three\n- four\n\n1. first\n2. second", &theme, 12);
        assert_eq!(
            plain(&lines),
            vec!["• one two", "  three", "• four", "", "1. first", "2. second"]
        );
    }

    #[test]
    fn code_blocks_keep_their_lines() {
        let theme = Theme::default();
        let lines = render_markup("```\nls -la\n  cd x\n```", &theme, 6);
        assert_eq!(plain(&lines), vec!["    ls -la", "      cd x"]);
    }

    #[test]
    fn long_words_are_split() {
        let lines = wrap_spans(vec![Span::raw("abcdefghij")], 4, "", "");
        assert_eq!(plain(&lines), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn tokens_alternate_between_words_and_spaces() {
        assert_eq!(tokens("a  bc d"), vec!["a", "  ", "bc", " ", "d"]);
        assert!(tokens("").is_empty());
    }
}
