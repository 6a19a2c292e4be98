//! The shortcut help screen, generated from the binding table.

use ratatui::text::{Line, Span};

use crate::core::app::KeyContext;
use crate::ui::theme::Theme;
use crate::ui::worksheet_loop::keybindings::{bindings, BindingCommand};

const LABEL_WIDTH: usize = 22;

fn section_title(context: KeyContext) -> Option<&'static str> {
    match context {
        KeyContext::Idle => Some("Worksheet"),
        KeyContext::SourceEdit => Some("Source editor"),
        KeyContext::TerminalFocus => Some("Terminal"),
        KeyContext::EditingField => Some("Prompts"),
        KeyContext::DialogOpen => Some("Dialogs"),
        KeyContext::InformationModal => None,
    }
}

pub fn help_lines(theme: &Theme) -> Vec<Line<'static>> {
    let all = bindings();
    let mut lines = Vec::new();
    for context in [
        KeyContext::Idle,
        KeyContext::SourceEdit,
        KeyContext::TerminalFocus,
        KeyContext::EditingField,
        KeyContext::DialogOpen,
    ] {
        let Some(title) = section_title(context) else {
            continue;
        };
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(Span::styled(title, theme.heading_style)));
        for binding in all.iter().filter(|binding| {
            binding.context == context && matches!(binding.command, BindingCommand::Action(_))
        }) {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<LABEL_WIDTH$}", binding.label), theme.code_style),
                Span::styled(binding.help, theme.text_style),
            ]));
        }
    }
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::styled(format!("  {:<LABEL_WIDTH$}", "ctrl+c"), theme.code_style),
        Span::styled("Quit from anywhere", theme.text_style),
    ]));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    #[test]
    fn help_lists_chords_and_sections() {
        let text = plain(&help_lines(&Theme::default()));
        assert_eq!(text[0], "Worksheet");
        assert!(text.iter().any(|line| line.starts_with("  g g") && line.ends_with("Go to top")));
        assert!(text.iter().any(|line| line == "Source editor"));
        assert_eq!(text.iter().filter(|line| line.contains("ctrl+c")).count(), 1);
    }
}
