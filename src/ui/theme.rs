use ratatui::style::{Color, Modifier, Style};

use crate::core::worksheet::BundleState;

#[derive(Debug, Clone)]
pub struct Theme {
    pub title_style: Style,
    pub meta_style: Style,
    pub sticky_header_style: Style,
    pub text_style: Style,
    pub heading_style: Style,
    pub code_style: Style,
    pub link_style: Style,
    pub quote_style: Style,
    pub table_header_style: Style,
    /// Marker column of the focused item.
    pub focus_marker_style: Style,
    pub focused_row_style: Style,
    pub selected_style: Style,
    pub directive_style: Style,
    pub unsupported_style: Style,
    pub toast_style: Style,
    pub dialog_border_style: Style,
    pub error_style: Style,
    pub hint_style: Style,
    pub terminal_border_style: Style,
    pub terminal_output_style: Style,
    pub input_text_style: Style,
    pub input_cursor_style: Style,
    pub input_cursor_line_style: Style,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            title_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            meta_style: Style::default().fg(Color::DarkGray),
            sticky_header_style: Style::default().fg(Color::Gray).bg(Color::Black),
            text_style: Style::default().fg(Color::White),
            heading_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            code_style: Style::default().fg(Color::Yellow),
            link_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            quote_style: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            table_header_style: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::BOLD),
            focus_marker_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            focused_row_style: Style::default().bg(Color::Rgb(0x26, 0x32, 0x38)),
            selected_style: Style::default().fg(Color::Magenta),
            directive_style: Style::default().fg(Color::Green),
            unsupported_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
            toast_style: Style::default().fg(Color::Black).bg(Color::Yellow),
            dialog_border_style: Style::default().fg(Color::Cyan),
            error_style: Style::default().fg(Color::Red),
            hint_style: Style::default().fg(Color::DarkGray),
            terminal_border_style: Style::default().fg(Color::Gray),
            terminal_output_style: Style::default().fg(Color::Gray),
            input_text_style: Style::default().fg(Color::White),
            input_cursor_style: Style::default().add_modifier(Modifier::REVERSED),
            input_cursor_line_style: Style::default(),
        }
    }

    pub fn state_style(&self, state: &BundleState) -> Style {
        let color = match state {
            BundleState::Ready => Color::Green,
            BundleState::Failed | BundleState::Killed | BundleState::WorkerOffline => Color::Red,
            BundleState::Running | BundleState::Finalizing => Color::Yellow,
            BundleState::Unknown(_) => Color::DarkGray,
            _ => Color::Blue,
        };
        Style::default().fg(color)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark_default()
    }
}
