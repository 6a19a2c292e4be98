use crate::api::UserInfo;
use crate::core::focus::ScrollState;
use ratatui::prelude::Size;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tui_textarea::{CursorMove, TextArea};

const TERMINAL_SCROLLBACK: usize = 500;
const DEFAULT_TOAST_DURATION: Duration = Duration::from_secs(3);

/// Which key vocabulary is live. Earlier variants win when several
/// surfaces are open at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyContext {
    DialogOpen,
    InformationModal,
    SourceEdit,
    EditingField,
    TerminalFocus,
    Idle,
}

impl KeyContext {
    /// Contexts where unbound keys belong to a text area.
    pub fn is_text_entry(self) -> bool {
        matches!(
            self,
            KeyContext::SourceEdit | KeyContext::EditingField | KeyContext::TerminalFocus
        )
    }
}

/// Transient status line message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    /// `None` keeps the toast up until something replaces it.
    pub expires_at: Option<Instant>,
}

/// What a single-line prompt is collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    InsertText { after_sort_key: i64 },
    Upload { after_sort_key: i64 },
    /// New run and rerun share this; rerun just starts prefilled.
    Run { after_sort_key: i64 },
    EditTitle,
    EditBundleName { bundle_uuid: String },
}

impl PromptKind {
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::InsertText { .. } => "Insert text",
            PromptKind::Upload { .. } => "Upload path",
            PromptKind::Run { .. } => "Run",
            PromptKind::EditTitle => "Worksheet title",
            PromptKind::EditBundleName { .. } => "Bundle name",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub textarea: TextArea<'static>,
}

impl Prompt {
    pub fn new(kind: PromptKind, initial: &str) -> Self {
        let mut textarea = TextArea::from(vec![initial.to_string()]);
        textarea.move_cursor(CursorMove::End);
        Self { kind, textarea }
    }

    pub fn text(&self) -> String {
        self.textarea.lines().join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoModal {
    Help,
    BundleInfo { uuid: String },
}

/// The command panel at the bottom of the screen.
#[derive(Debug, Clone)]
pub struct TerminalPanel {
    pub visible: bool,
    pub focused: bool,
    pub input: TextArea<'static>,
    pub output: VecDeque<String>,
    pub history: Vec<String>,
    /// Position while walking history; `None` means editing a fresh line.
    pub history_index: Option<usize>,
}

impl Default for TerminalPanel {
    fn default() -> Self {
        Self {
            visible: false,
            focused: false,
            input: TextArea::default(),
            output: VecDeque::new(),
            history: Vec::new(),
            history_index: None,
        }
    }
}

impl TerminalPanel {
    pub fn input_text(&self) -> String {
        self.input.lines().join(" ")
    }

    pub fn set_input(&mut self, text: &str) {
        self.input = TextArea::from(vec![text.to_string()]);
        self.input.move_cursor(CursorMove::End);
    }

    pub fn insert_text(&mut self, text: &str) {
        self.input.insert_str(text);
    }

    pub fn push_output<S: AsRef<str>>(&mut self, text: S) {
        for line in text.as_ref().lines() {
            self.output.push_back(line.to_string());
        }
        while self.output.len() > TERMINAL_SCROLLBACK {
            self.output.pop_front();
        }
    }

    pub fn record_history(&mut self, command: &str) {
        if self.history.last().map(String::as_str) != Some(command) {
            self.history.push(command.to_string());
        }
        self.history_index = None;
    }

    /// Step through history. `older` walks backwards.
    pub fn recall(&mut self, older: bool) {
        if self.history.is_empty() {
            return;
        }
        let next = match (self.history_index, older) {
            (None, true) => Some(self.history.len() - 1),
            (None, false) => None,
            (Some(0), true) => Some(0),
            (Some(index), true) => Some(index - 1),
            (Some(index), false) if index + 1 < self.history.len() => Some(index + 1),
            (Some(_), false) => None,
        };
        self.history_index = next;
        let text = next
            .and_then(|index| self.history.get(index).cloned())
            .unwrap_or_default();
        self.set_input(&text);
    }
}

#[derive(Debug, Clone)]
pub struct UiState {
    pub toast: Option<Toast>,
    pub toast_duration: Duration,
    pub scroll: ScrollState,
    pub sticky_header_lines: u16,
    pub terminal: TerminalPanel,
    pub prompt: Option<Prompt>,
    pub info_modal: Option<InfoModal>,
    pub source_editor: Option<TextArea<'static>>,
    /// A save request is in flight; further saves are ignored.
    pub source_saving: bool,
    pub show_paste_button: bool,
    pub user: Option<UserInfo>,
    pub last_term_size: Size,
    pub exit_requested: bool,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            toast: None,
            toast_duration: DEFAULT_TOAST_DURATION,
            scroll: ScrollState::default(),
            sticky_header_lines: 2,
            terminal: TerminalPanel::default(),
            prompt: None,
            info_modal: None,
            source_editor: None,
            source_saving: false,
            show_paste_button: false,
            user: None,
            last_term_size: Size::default(),
            exit_requested: false,
        }
    }
}

impl UiState {
    /// A toast that stays until replaced.
    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            expires_at: None,
        });
    }

    pub fn show_timed_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast {
            message: message.into(),
            expires_at: Some(Instant::now() + self.toast_duration),
        });
    }

    /// Keep the current toast text but let it expire.
    pub fn expire_toast_later(&mut self) {
        let deadline = Instant::now() + self.toast_duration;
        if let Some(toast) = self.toast.as_mut() {
            toast.expires_at = Some(deadline);
        }
    }

    pub fn clear_toast(&mut self) {
        self.toast = None;
    }

    /// Drop an expired toast. Returns whether anything changed.
    pub fn expire_toast(&mut self, now: Instant) -> bool {
        let expired = self
            .toast
            .as_ref()
            .and_then(|toast| toast.expires_at)
            .is_some_and(|deadline| deadline <= now);
        if expired {
            self.toast = None;
        }
        expired
    }

    pub fn toast_message(&self) -> Option<&str> {
        self.toast.as_ref().map(|toast| toast.message.as_str())
    }

    pub fn open_source_editor(&mut self, lines: Vec<String>, cursor_line: usize) {
        let mut editor = TextArea::from(lines);
        let row = u16::try_from(cursor_line).unwrap_or(u16::MAX);
        editor.move_cursor(CursorMove::Jump(row, 0));
        self.source_editor = Some(editor);
        self.source_saving = false;
    }

    pub fn close_source_editor(&mut self) {
        self.source_editor = None;
        self.source_saving = false;
    }

    /// The text area that receives unbound keys in `context`.
    pub fn active_textarea_mut(&mut self, context: KeyContext) -> Option<&mut TextArea<'static>> {
        match context {
            KeyContext::SourceEdit => self.source_editor.as_mut(),
            KeyContext::EditingField => self.prompt.as_mut().map(|prompt| &mut prompt.textarea),
            KeyContext::TerminalFocus => Some(&mut self.terminal.input),
            _ => None,
        }
    }

    pub fn focus_terminal(&mut self) {
        self.terminal.visible = true;
        self.terminal.focused = true;
    }

    pub fn toggle_terminal(&mut self) {
        self.terminal.visible = !self.terminal.visible;
        self.terminal.focused = self.terminal.visible;
    }
}
