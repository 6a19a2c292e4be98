//! Mode-aware keybinding system
//!
//! The whole shortcut vocabulary lives in [`bindings`]; the registry and
//! the help screen are both built from it.

pub mod handlers;
pub mod registry;

use ratatui::crossterm::event::KeyCode;

use crate::core::app::{AppAction, KeyContext};
use crate::core::dialog::DialogInput;

pub use registry::{ChordState, KeyPattern, KeyResult, ModeAwareRegistry};

/// Action to take in the main event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyLoopAction {
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy)]
pub enum Keys {
    Single(KeyPattern),
    Chord(KeyPattern, KeyPattern),
}

#[derive(Debug, Clone, Copy)]
pub enum BindingCommand {
    Action(fn() -> AppAction),
    Exit,
}

/// One row of the shortcut vocabulary.
#[derive(Debug, Clone)]
pub struct Binding {
    pub context: KeyContext,
    pub keys: Vec<Keys>,
    /// How the keys are written on the help screen.
    pub label: &'static str,
    pub help: &'static str,
    pub command: BindingCommand,
}

fn bind(
    context: KeyContext,
    keys: Vec<Keys>,
    label: &'static str,
    help: &'static str,
    make: fn() -> AppAction,
) -> Binding {
    Binding {
        context,
        keys,
        label,
        help,
        command: BindingCommand::Action(make),
    }
}

fn key(c: char) -> Keys {
    Keys::Single(KeyPattern::char(c))
}

fn code(code: KeyCode) -> Keys {
    Keys::Single(KeyPattern::simple(code))
}

fn chord(first: char, second: char) -> Keys {
    Keys::Chord(KeyPattern::char(first), KeyPattern::char(second))
}

pub fn bindings() -> Vec<Binding> {
    use KeyContext::*;

    let mut all = vec![
        // Navigation
        bind(Idle, vec![key('k'), code(KeyCode::Up)], "k / ↑", "Move up", || AppAction::MoveUp),
        bind(Idle, vec![key('j'), code(KeyCode::Down)], "j / ↓", "Move down", || {
            AppAction::MoveDown
        }),
        bind(Idle, vec![chord('g', 'g')], "g g", "Go to top", || AppAction::MoveTop),
        bind(Idle, vec![key('G')], "G", "Go to end", || AppAction::MoveEnd),
        bind(Idle, vec![code(KeyCode::Enter)], "enter", "Open focused item", || {
            AppAction::OpenFocused
        }),
        bind(
            Idle,
            vec![Keys::Single(KeyPattern::shift(KeyCode::Enter))],
            "shift+enter",
            "Copy the focused item's web link",
            || AppAction::OpenFocusedExternally,
        ),
        bind(Idle, vec![key('x'), key(' ')], "x / space", "Toggle selection", || {
            AppAction::ToggleSelection
        }),
        bind(Idle, vec![key('i')], "i", "Insert focused uuid into terminal", || {
            AppAction::InsertFocusedUuid
        }),
        bind(Idle, vec![key('+')], "+", "Toggle worksheet width", || AppAction::ToggleWidth),
        bind(
            Idle,
            vec![Keys::Single(KeyPattern::alt(KeyCode::Left))],
            "alt+←",
            "Back",
            || AppAction::Back,
        ),
        bind(
            Idle,
            vec![Keys::Single(KeyPattern::alt(KeyCode::Right))],
            "alt+→",
            "Forward",
            || AppAction::Forward,
        ),
        // Editing
        bind(Idle, vec![key('E')], "E", "Edit source", || AppAction::EnterSource),
        bind(Idle, vec![chord('a', 't')], "a t", "Insert text below", || {
            AppAction::StartInsertText
        }),
        bind(Idle, vec![chord('a', 'u')], "a u", "Upload below", || AppAction::StartUpload),
        bind(Idle, vec![chord('a', 'r')], "a r", "New run below", || AppAction::StartNewRun),
        bind(Idle, vec![chord('a', 'n')], "a n", "Rerun focused bundle", || {
            AppAction::StartRerun
        }),
        bind(Idle, vec![key('T')], "T", "Edit worksheet title", || AppAction::EditTitle),
        bind(Idle, vec![key('N')], "N", "Rename focused bundle", || AppAction::EditBundleName),
        bind(
            Idle,
            vec![code(KeyCode::Backspace), code(KeyCode::Delete)],
            "backspace / del",
            "Delete focused item or selection",
            || AppAction::DeleteFocused,
        ),
        bind(Idle, vec![chord('a', 's')], "a s", "Copy download link", || {
            AppAction::DownloadFocused
        }),
        // Bulk
        bind(Idle, vec![chord('a', 'c')], "a c", "Copy bundles", || AppAction::Copy),
        bind(Idle, vec![chord('a', 'd')], "a d", "Cut bundles", || AppAction::Cut),
        bind(Idle, vec![chord('a', 'v')], "a v", "Paste bundles", || AppAction::Paste),
        bind(Idle, vec![chord('a', 'p')], "a p", "Preview clipboard", || AppAction::ShowPaste),
        bind(Idle, vec![chord('a', 'y')], "a y", "Show selection refs", || AppAction::ShowCopy),
        bind(Idle, vec![chord('a', 'k')], "a k", "Kill selected", || AppAction::Kill),
        bind(Idle, vec![chord('a', 'D')], "a D", "Detach selected", || AppAction::Detach),
        bind(Idle, vec![chord('a', 'x')], "a x", "Delete worksheet", || {
            AppAction::DeleteWorksheet
        }),
        // Other
        bind(Idle, vec![chord('c', 'c')], "c c", "Focus terminal", || AppAction::FocusTerminal),
        bind(Idle, vec![key('C')], "C", "Toggle terminal", || AppAction::ToggleTerminal),
        bind(Idle, vec![key('R')], "R", "Refresh", || AppAction::Refresh),
        bind(Idle, vec![chord('a', 'f')], "a f", "Search", || AppAction::FocusSearch),
        bind(Idle, vec![key('?')], "?", "Shortcut help", || AppAction::ShowHelp),
        bind(Idle, vec![key('q')], "q", "Quit", || AppAction::Quit),
        // Source editor
        bind(
            SourceEdit,
            vec![
                Keys::Single(KeyPattern::ctrl(KeyCode::Enter)),
                Keys::Single(KeyPattern::ctrl(KeyCode::Char('s'))),
            ],
            "ctrl+enter / ctrl+s",
            "Save source",
            || AppAction::SaveSource,
        ),
        bind(SourceEdit, vec![code(KeyCode::Esc)], "esc", "Discard source edits", || {
            AppAction::ExitSource
        }),
        // Terminal
        bind(TerminalFocus, vec![code(KeyCode::Enter)], "enter", "Run command", || {
            AppAction::TerminalSubmit
        }),
        bind(TerminalFocus, vec![code(KeyCode::Tab)], "tab", "Complete", || {
            AppAction::TerminalComplete
        }),
        bind(TerminalFocus, vec![code(KeyCode::Up)], "↑", "Older command", || {
            AppAction::TerminalHistory { older: true }
        }),
        bind(TerminalFocus, vec![code(KeyCode::Down)], "↓", "Newer command", || {
            AppAction::TerminalHistory { older: false }
        }),
        bind(TerminalFocus, vec![code(KeyCode::Esc)], "esc", "Leave terminal", || {
            AppAction::LeaveTerminal
        }),
        // Prompts
        bind(EditingField, vec![code(KeyCode::Enter)], "enter", "Submit", || {
            AppAction::SubmitPrompt
        }),
        bind(EditingField, vec![code(KeyCode::Esc)], "esc", "Cancel", || {
            AppAction::CancelPrompt
        }),
        // Dialogs
        bind(DialogOpen, vec![code(KeyCode::Enter)], "enter", "Confirm", || {
            AppAction::Dialog {
                input: DialogInput::Confirm,
            }
        }),
        bind(DialogOpen, vec![code(KeyCode::Esc)], "esc", "Cancel", || AppAction::Dialog {
            input: DialogInput::Cancel,
        }),
        bind(DialogOpen, vec![key('f')], "f", "Toggle force delete", || {
            AppAction::Dialog {
                input: DialogInput::ToggleForce,
            }
        }),
        bind(
            InformationModal,
            vec![code(KeyCode::Esc), key('q'), code(KeyCode::Enter), key('?')],
            "esc",
            "Close",
            || AppAction::CloseModal,
        ),
    ];

    for context in [
        Idle,
        SourceEdit,
        TerminalFocus,
        EditingField,
        DialogOpen,
        InformationModal,
    ] {
        all.push(Binding {
            context,
            keys: vec![Keys::Single(KeyPattern::ctrl(KeyCode::Char('c')))],
            label: "ctrl+c",
            help: "Quit",
            command: BindingCommand::Exit,
        });
    }
    all
}

/// Build a complete mode-aware registry with all handlers
pub fn build_mode_aware_registry() -> ModeAwareRegistry {
    use handlers::{ActionHandler, ExitHandler};
    use registry::{KeyHandler, ModeAwareBuilder};

    let mut builder = ModeAwareBuilder::new();
    for binding in bindings() {
        for keys in &binding.keys {
            let handler: Box<dyn KeyHandler> = match binding.command {
                BindingCommand::Action(make) => Box::new(ActionHandler::new(make)),
                BindingCommand::Exit => Box::new(ExitHandler),
            };
            builder = match *keys {
                Keys::Single(pattern) => {
                    builder.register_for_context(binding.context, pattern, handler)
                }
                Keys::Chord(prefix, second) => {
                    builder.register_chord(binding.context, prefix, second, handler)
                }
            };
        }
    }
    builder.build()
}
