use crate::core::focus::{clamp_focus, relocate_after_reload, Focus, ReloadIntent};
use crate::core::source::focus_for_raw_line;
use crate::core::worksheet::Worksheet;

/// Focus to install once a full reload of the current worksheet lands.
/// `old` is the worksheet the focus was computed against, if any.
pub fn focus_after_reload(
    old: Option<&Worksheet>,
    new: &Worksheet,
    old_focus: Focus,
    intent: ReloadIntent,
) -> Focus {
    match intent {
        ReloadIntent::Reset => Focus::NONE,
        ReloadIntent::KeepFocus => clamp_focus(new, old_focus).0,
        ReloadIntent::Relocate { after_sort_key } => match old {
            Some(old) => relocate_after_reload(old, new, old_focus, after_sort_key),
            None => clamp_focus(new, old_focus).0,
        },
        ReloadIntent::FromSource { raw_line } => focus_for_raw_line(new, raw_line),
    }
}
