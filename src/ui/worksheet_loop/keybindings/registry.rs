//! Mode-aware keybinding registry system
//!
//! Handlers are registered per [`KeyContext`], either for a single key or
//! for a two-key chord such as `g g`. Chord prefixes are remembered in a
//! [`ChordState`] owned by the event loop and expire after
//! [`CHORD_TIMEOUT`].

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::Size;

use crate::core::app::{AppActionDispatcher, KeyContext};
use crate::ui::worksheet_loop::{AppHandle, KeyLoopAction};

pub const CHORD_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types and Traits
// ============================================================================

/// Result of handling a key event
#[derive(Debug, Clone, PartialEq)]
pub enum KeyResult {
    /// Key was handled and should continue the loop
    Continue,
    /// Key was handled and should exit the loop
    Exit,
    /// Key was handled (generic)
    Handled,
    /// Key was not handled by this handler
    NotHandled,
}

impl From<KeyLoopAction> for KeyResult {
    fn from(action: KeyLoopAction) -> Self {
        match action {
            KeyLoopAction::Continue => KeyResult::Continue,
            KeyLoopAction::Break => KeyResult::Exit,
        }
    }
}

/// Trait for keybinding handlers
#[async_trait::async_trait]
pub trait KeyHandler: Send + Sync {
    async fn handle(
        &self,
        app: &AppHandle,
        dispatcher: &AppActionDispatcher,
        key: &KeyEvent,
        term_size: Size,
    ) -> KeyResult;
}

/// Pattern for matching key events. Character keys ignore SHIFT since the
/// character itself already carries the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPattern {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyPattern {
    pub fn simple(code: KeyCode) -> Self {
        Self::with_modifiers(code, KeyModifiers::NONE)
    }

    pub fn char(c: char) -> Self {
        Self::simple(KeyCode::Char(c))
    }

    pub fn ctrl(code: KeyCode) -> Self {
        Self::with_modifiers(code, KeyModifiers::CONTROL)
    }

    pub fn shift(code: KeyCode) -> Self {
        Self::with_modifiers(code, KeyModifiers::SHIFT)
    }

    pub fn alt(code: KeyCode) -> Self {
        Self::with_modifiers(code, KeyModifiers::ALT)
    }

    pub fn with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Self {
        let modifiers = match code {
            KeyCode::Char(_) => modifiers.difference(KeyModifiers::SHIFT),
            _ => modifiers,
        };
        Self { code, modifiers }
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        *self == KeyPattern::from(key)
    }
}

impl From<&KeyEvent> for KeyPattern {
    fn from(key: &KeyEvent) -> Self {
        // BackTab arrives for shift+tab on most terminals.
        let code = match key.code {
            KeyCode::BackTab => KeyCode::Tab,
            code => code,
        };
        let modifiers = if key.code == KeyCode::BackTab {
            key.modifiers | KeyModifiers::SHIFT
        } else {
            key.modifiers
        };
        Self::with_modifiers(code, modifiers)
    }
}

/// The first key of a chord waiting for its second key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingChord {
    context: KeyContext,
    prefix: KeyPattern,
    since: Instant,
}

#[derive(Debug, Default, Clone)]
pub struct ChordState {
    pending: Option<PendingChord>,
}

impl ChordState {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// The live prefix for `context`, dropping it when it timed out or was
    /// started in another context.
    fn take(&mut self, context: KeyContext, now: Instant) -> Option<KeyPattern> {
        let pending = self.pending.take()?;
        let live = pending.context == context && now.duration_since(pending.since) < CHORD_TIMEOUT;
        live.then_some(pending.prefix)
    }

    /// Forget a prefix older than [`CHORD_TIMEOUT`]. Returns whether one
    /// was dropped.
    pub fn expire(&mut self, now: Instant) -> bool {
        let expired = self
            .pending
            .is_some_and(|pending| now.duration_since(pending.since) >= CHORD_TIMEOUT);
        if expired {
            self.pending = None;
        }
        expired
    }
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Default)]
struct ContextBindings {
    keys: HashMap<KeyPattern, Box<dyn KeyHandler>>,
    chords: HashMap<(KeyPattern, KeyPattern), Box<dyn KeyHandler>>,
    prefixes: HashSet<KeyPattern>,
}

/// Mode-aware keybinding registry
#[derive(Default)]
pub struct ModeAwareRegistry {
    contexts: HashMap<KeyContext, ContextBindings>,
}

impl ModeAwareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a specific context
    pub fn register_for_context(
        &mut self,
        context: KeyContext,
        pattern: KeyPattern,
        handler: Box<dyn KeyHandler>,
    ) {
        self.contexts
            .entry(context)
            .or_default()
            .keys
            .insert(pattern, handler);
    }

    pub fn register_chord(
        &mut self,
        context: KeyContext,
        prefix: KeyPattern,
        key: KeyPattern,
        handler: Box<dyn KeyHandler>,
    ) {
        let bindings = self.contexts.entry(context).or_default();
        bindings.prefixes.insert(prefix);
        bindings.chords.insert((prefix, key), handler);
    }

    fn is_bound(&self, key: &KeyEvent, context: KeyContext) -> bool {
        let pattern = KeyPattern::from(key);
        self.contexts.get(&context).is_some_and(|bindings| {
            bindings.keys.contains_key(&pattern) || bindings.prefixes.contains(&pattern)
        })
    }

    /// Text contexts hand every key without a binding to the focused text
    /// area.
    pub fn should_handle_as_text_input(&self, key: &KeyEvent, context: KeyContext) -> bool {
        context.is_text_entry() && !self.is_bound(key, context)
    }

    /// Handle a key event in the given context
    pub async fn handle_key_event(
        &self,
        app: &AppHandle,
        dispatcher: &AppActionDispatcher,
        key: &KeyEvent,
        context: KeyContext,
        chord: &mut ChordState,
        term_size: Size,
    ) -> ModeAwareResult {
        let Some(bindings) = self.contexts.get(&context) else {
            chord.clear();
            return ModeAwareResult::not_handled();
        };
        let pattern = KeyPattern::from(key);
        let now = Instant::now();

        if let Some(prefix) = chord.take(context, now) {
            if let Some(handler) = bindings.chords.get(&(prefix, pattern)) {
                let result = handler.handle(app, dispatcher, key, term_size).await;
                return ModeAwareResult {
                    result,
                    chord_pending: false,
                };
            }
        }

        if bindings.prefixes.contains(&pattern) {
            chord.pending = Some(PendingChord {
                context,
                prefix: pattern,
                since: now,
            });
            return ModeAwareResult {
                result: KeyResult::Handled,
                chord_pending: true,
            };
        }

        if let Some(handler) = bindings.keys.get(&pattern) {
            let result = handler.handle(app, dispatcher, key, term_size).await;
            return ModeAwareResult {
                result,
                chord_pending: false,
            };
        }

        ModeAwareResult::not_handled()
    }
}

/// Result from mode-aware key handling
#[derive(Debug)]
pub struct ModeAwareResult {
    pub result: KeyResult,
    /// The key started a chord and is waiting for its second half.
    pub chord_pending: bool,
}

impl ModeAwareResult {
    fn not_handled() -> Self {
        Self {
            result: KeyResult::NotHandled,
            chord_pending: false,
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for creating a fully configured mode-aware registry
#[derive(Default)]
pub struct ModeAwareBuilder {
    registry: ModeAwareRegistry,
}

impl ModeAwareBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the final registry
    pub fn build(self) -> ModeAwareRegistry {
        self.registry
    }

    /// Register a handler for a specific context
    pub fn register_for_context(
        mut self,
        context: KeyContext,
        pattern: KeyPattern,
        handler: Box<dyn KeyHandler>,
    ) -> Self {
        self.registry
            .register_for_context(context, pattern, handler);
        self
    }

    pub fn register_chord(
        mut self,
        context: KeyContext,
        prefix: KeyPattern,
        key: KeyPattern,
        handler: Box<dyn KeyHandler>,
    ) -> Self {
        self.registry.register_chord(context, prefix, key, handler);
        self
    }
}
