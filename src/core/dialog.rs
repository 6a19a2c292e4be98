//! Confirmation and information dialogs.
//!
//! Exactly one dialog can be open at a time. `force` only exists on
//! [`DialogState::ConfirmDelete`], which keeps it from leaking into other
//! confirmations.

use crate::core::bulk::BulkCommand;
use crate::core::clipboard::ClipboardEntry;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Idle,
    ConfirmDelete {
        force: bool,
        /// Set when deleting the focused bundle with nothing selected; the
        /// selection is left alone.
        focused: Option<String>,
    },
    ConfirmKill,
    ConfirmDetach,
    /// Remove a non-bundle item (text, schema, search directive).
    ConfirmDeleteBlock {
        item_type: String,
        item_ids: Vec<i64>,
        preview: String,
    },
    ConfirmDeleteWorksheet,
    ShowError {
        message: String,
    },
    ShowCopy {
        text: String,
    },
    ShowPaste {
        entries: Vec<ClipboardEntry>,
    },
}

/// The reduced key vocabulary available while a dialog is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogInput {
    Confirm,
    Cancel,
    ToggleForce,
}

/// What a confirmed dialog asks the controller to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// `uuids` overrides the selection as the command's targets.
    Bulk {
        command: BulkCommand,
        force: bool,
        uuids: Option<Vec<String>>,
    },
    DeleteBlock { item_type: String, item_ids: Vec<i64> },
    DeleteWorksheet,
    Paste,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    /// The input did nothing in this state.
    Ignored,
    /// Still open, possibly with a changed flag.
    Updated,
    Closed,
    Confirmed(Confirmation),
}

impl DialogState {
    /// Delete confirmation for the current selection.
    pub fn confirm_delete() -> Self {
        DialogState::ConfirmDelete {
            force: false,
            focused: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, DialogState::Idle)
    }

    pub fn force_delete(&self) -> bool {
        matches!(self, DialogState::ConfirmDelete { force: true, .. })
    }

    pub fn is_confirmation(&self) -> bool {
        matches!(
            self,
            DialogState::ConfirmDelete { .. }
                | DialogState::ConfirmKill
                | DialogState::ConfirmDetach
                | DialogState::ConfirmDeleteBlock { .. }
                | DialogState::ConfirmDeleteWorksheet
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            DialogState::Idle => "",
            DialogState::ConfirmDelete {
                focused: Some(_), ..
            } => "Delete this bundle?",
            DialogState::ConfirmDelete { .. } => "Delete selected bundles?",
            DialogState::ConfirmKill => "Kill selected bundles?",
            DialogState::ConfirmDetach => "Detach selected bundles?",
            DialogState::ConfirmDeleteBlock { .. } => "Delete this item?",
            DialogState::ConfirmDeleteWorksheet => "Delete this worksheet?",
            DialogState::ShowError { .. } => "Error",
            DialogState::ShowCopy { .. } => "Copied",
            DialogState::ShowPaste { .. } => "Paste bundles",
        }
    }

    /// Apply one dialog key. The state is left at `Idle` whenever the
    /// outcome is `Closed` or `Confirmed`.
    pub fn handle(&mut self, input: DialogInput) -> DialogOutcome {
        let outcome = match (&mut *self, input) {
            (DialogState::Idle, _) => return DialogOutcome::Ignored,
            (DialogState::ConfirmDelete { force, .. }, DialogInput::ToggleForce) => {
                *force = !*force;
                return DialogOutcome::Updated;
            }
            (_, DialogInput::ToggleForce) => return DialogOutcome::Ignored,
            (_, DialogInput::Cancel) => DialogOutcome::Closed,
            (DialogState::ConfirmDelete { force, focused }, DialogInput::Confirm) => {
                DialogOutcome::Confirmed(Confirmation::Bulk {
                    command: BulkCommand::Rm,
                    force: *force,
                    uuids: focused.take().map(|uuid| vec![uuid]),
                })
            }
            (DialogState::ConfirmKill, DialogInput::Confirm) => {
                DialogOutcome::Confirmed(Confirmation::Bulk {
                    command: BulkCommand::Kill,
                    force: false,
                    uuids: None,
                })
            }
            (DialogState::ConfirmDetach, DialogInput::Confirm) => {
                DialogOutcome::Confirmed(Confirmation::Bulk {
                    command: BulkCommand::Detach,
                    force: false,
                    uuids: None,
                })
            }
            (
                DialogState::ConfirmDeleteBlock {
                    item_type,
                    item_ids,
                    ..
                },
                DialogInput::Confirm,
            ) => DialogOutcome::Confirmed(Confirmation::DeleteBlock {
                item_type: std::mem::take(item_type),
                item_ids: std::mem::take(item_ids),
            }),
            (DialogState::ConfirmDeleteWorksheet, DialogInput::Confirm) => {
                DialogOutcome::Confirmed(Confirmation::DeleteWorksheet)
            }
            (DialogState::ShowPaste { .. }, DialogInput::Confirm) => {
                DialogOutcome::Confirmed(Confirmation::Paste)
            }
            (
                DialogState::ShowError { .. } | DialogState::ShowCopy { .. },
                DialogInput::Confirm,
            ) => DialogOutcome::Closed,
        };
        *self = DialogState::Idle;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_toggles_only_inside_confirm_delete() {
        let mut dialog = DialogState::confirm_delete();
        assert_eq!(dialog.handle(DialogInput::ToggleForce), DialogOutcome::Updated);
        assert!(dialog.force_delete());
        assert_eq!(dialog.handle(DialogInput::ToggleForce), DialogOutcome::Updated);
        assert!(!dialog.force_delete());

        let mut kill = DialogState::ConfirmKill;
        assert_eq!(kill.handle(DialogInput::ToggleForce), DialogOutcome::Ignored);
        assert_eq!(kill, DialogState::ConfirmKill);
    }

    #[test]
    fn confirm_delete_carries_the_force_flag() {
        let mut dialog = DialogState::confirm_delete();
        dialog.handle(DialogInput::ToggleForce);
        assert_eq!(
            dialog.handle(DialogInput::Confirm),
            DialogOutcome::Confirmed(Confirmation::Bulk {
                command: BulkCommand::Rm,
                force: true,
                uuids: None,
            })
        );
        assert_eq!(dialog, DialogState::Idle);
    }

    #[test]
    fn focused_delete_targets_only_that_bundle() {
        let mut dialog = DialogState::ConfirmDelete {
            force: false,
            focused: Some("U7".into()),
        };
        assert_eq!(dialog.title(), "Delete this bundle?");
        assert_eq!(
            dialog.handle(DialogInput::Confirm),
            DialogOutcome::Confirmed(Confirmation::Bulk {
                command: BulkCommand::Rm,
                force: false,
                uuids: Some(vec!["U7".to_string()]),
            })
        );
    }

    #[test]
    fn cancel_returns_to_idle_from_any_dialog() {
        for mut dialog in [
            DialogState::ConfirmDelete {
                force: true,
                focused: None,
            },
            DialogState::ConfirmKill,
            DialogState::ConfirmDetach,
            DialogState::ConfirmDeleteWorksheet,
            DialogState::ShowError {
                message: "boom".into(),
            },
            DialogState::ShowPaste {
                entries: Vec::new(),
            },
        ] {
            assert_eq!(dialog.handle(DialogInput::Cancel), DialogOutcome::Closed);
            assert!(!dialog.is_open());
        }
    }

    #[test]
    fn error_dialog_closes_on_enter_without_confirming() {
        let mut dialog = DialogState::ShowError {
            message: "bad".into(),
        };
        assert_eq!(dialog.handle(DialogInput::Confirm), DialogOutcome::Closed);
        assert_eq!(dialog, DialogState::Idle);
    }

    #[test]
    fn delete_block_confirmation_hands_over_item_ids() {
        let mut dialog = DialogState::ConfirmDeleteBlock {
            item_type: "markup".into(),
            item_ids: vec![4, 5],
            preview: "hello".into(),
        };
        assert_eq!(
            dialog.handle(DialogInput::Confirm),
            DialogOutcome::Confirmed(Confirmation::DeleteBlock {
                item_type: "markup".into(),
                item_ids: vec![4, 5],
            })
        );
    }

    #[test]
    fn idle_ignores_everything() {
        let mut dialog = DialogState::Idle;
        assert_eq!(dialog.handle(DialogInput::Confirm), DialogOutcome::Ignored);
        assert_eq!(dialog.handle(DialogInput::Cancel), DialogOutcome::Ignored);
        assert!(!DialogState::ConfirmKill.force_delete());
    }
}
