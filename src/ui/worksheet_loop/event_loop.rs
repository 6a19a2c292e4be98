//! Event polling, dispatching, and UI rendering loop.
//!
//! Terminal input is read on its own task and forwarded as [`UiEvent`]s.
//! Each turn of the loop routes pending keys through the mode-aware
//! registry, drains the action queue into the [`App`](crate::core::app::App),
//! spawns one task per resulting command, and redraws at most 60 times per
//! second.

use std::{
    error::Error,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use ratatui::crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use ratatui::prelude::Size;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::WorksheetApi;
use crate::core::app::{
    apply_actions, execute, AppActionDispatcher, AppActionEnvelope, AppCommand, KeyContext,
};
use crate::core::store::SubscriptionId;
use crate::ui::renderer::ui;

use super::keybindings::{build_mode_aware_registry, ChordState, KeyResult, ModeAwareRegistry};
use super::lifecycle::{restore_terminal, setup_terminal, SharedTerminal};
use super::setup::bootstrap_app;
use super::{AppHandle, WorksheetLaunch};

#[derive(Debug)]
pub enum UiEvent {
    Crossterm(Event),
}

async fn is_exit_requested(app: &AppHandle) -> bool {
    app.read(|app| app.ui.exit_requested).await
}

/// Flag a redraw whenever the store commits a new snapshot.
async fn watch_store(app: &AppHandle) -> (SubscriptionId, Arc<AtomicBool>) {
    let changed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&changed);
    let id = app
        .update(|app| {
            app.store
                .subscribe(move |_| flag.store(true, Ordering::Release))
        })
        .await;
    (id, changed)
}

async fn current_terminal_size(terminal: &SharedTerminal) -> Size {
    let terminal_guard = terminal.lock().await;
    terminal_guard.size().unwrap_or_default()
}

async fn try_draw_frame(
    app: &AppHandle,
    terminal: &SharedTerminal,
    request_redraw: &mut bool,
    last_draw: &mut Instant,
    frame_duration: Duration,
) -> io::Result<()> {
    if !*request_redraw {
        return Ok(());
    }

    let now = Instant::now();
    if now.duration_since(*last_draw) < frame_duration {
        return Ok(());
    }

    let mut terminal_guard = terminal.lock().await;
    (app.update(|app| terminal_guard.draw(|f| ui(f, app))).await)?;
    *last_draw = now;
    *request_redraw = false;
    Ok(())
}

struct EventProcessingOutcome {
    events_processed: bool,
    request_redraw: bool,
    exit_requested: bool,
}

async fn process_ui_events(
    app: &AppHandle,
    event_rx: &mut mpsc::UnboundedReceiver<UiEvent>,
    mode_registry: &ModeAwareRegistry,
    dispatcher: &AppActionDispatcher,
    chord: &mut ChordState,
    term_size: Size,
) -> EventProcessingOutcome {
    let mut outcome = EventProcessingOutcome {
        events_processed: false,
        request_redraw: false,
        exit_requested: false,
    };

    while let Ok(ev) = event_rx.try_recv() {
        outcome.events_processed = true;
        match ev {
            UiEvent::Crossterm(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                let result =
                    route_keyboard_event(app, mode_registry, dispatcher, chord, key, term_size)
                        .await;
                if result == KeyResult::Exit {
                    outcome.exit_requested = true;
                    break;
                }
            }
            UiEvent::Crossterm(Event::Paste(text)) => {
                handle_paste_event(app, &text).await;
            }
            UiEvent::Crossterm(_) => {}
        }
    }

    if outcome.events_processed {
        outcome.request_redraw = true;
    }
    outcome
}

async fn route_keyboard_event(
    app: &AppHandle,
    mode_registry: &ModeAwareRegistry,
    dispatcher: &AppActionDispatcher,
    chord: &mut ChordState,
    key: KeyEvent,
    term_size: Size,
) -> KeyResult {
    let context = app.read(|app| app.key_context()).await;

    if mode_registry.should_handle_as_text_input(&key, context) {
        chord.clear();
        app.update(|app| {
            if let Some(textarea) = app.ui.active_textarea_mut(context) {
                textarea.input(tui_textarea::Input::from(key));
            }
        })
        .await;
        return KeyResult::Handled;
    }

    let registry_result = mode_registry
        .handle_key_event(app, dispatcher, &key, context, chord, term_size)
        .await;
    if registry_result.result == KeyResult::NotHandled {
        debug!(?key.code, ?context, "Unbound key");
    }
    registry_result.result
}

/// Normalise pasted text for a text area. Single-line inputs get the
/// newlines folded into spaces.
pub(crate) fn sanitize_pasted_text(text: &str, multiline: bool) -> String {
    let without_crlf = text.replace("\r\n", "\n");
    let without_cr = without_crlf.replace('\r', "\n");
    let expanded_tabs = without_cr.replace('\t', "    ");
    let cleaned: String = expanded_tabs
        .chars()
        .filter(|&c| c == '\n' || !c.is_control())
        .collect();
    if multiline {
        cleaned
    } else {
        cleaned.trim_end_matches('\n').replace('\n', " ")
    }
}

async fn handle_paste_event(app: &AppHandle, text: &str) {
    app.update(|app| {
        let context = app.key_context();
        if !context.is_text_entry() {
            return;
        }
        let sanitized = sanitize_pasted_text(text, context == KeyContext::SourceEdit);
        if sanitized.is_empty() {
            return;
        }
        if let Some(textarea) = app.ui.active_textarea_mut(context) {
            textarea.insert_str(sanitized);
        }
    })
    .await;
}

fn spawn_command(api: Arc<dyn WorksheetApi>, dispatcher: AppActionDispatcher, cmd: AppCommand) {
    tokio::spawn(async move {
        if let Some(action) = execute(api.as_ref(), cmd).await {
            dispatcher.dispatch(action);
        }
    });
}

async fn drain_action_queue(
    app: &AppHandle,
    dispatcher: &AppActionDispatcher,
    action_rx: &mut mpsc::UnboundedReceiver<AppActionEnvelope>,
) -> bool {
    let mut pending = Vec::new();
    while let Ok(envelope) = action_rx.try_recv() {
        pending.push(envelope);
    }

    if pending.is_empty() {
        return false;
    }

    let (commands, api) = app
        .update(|app| (apply_actions(app, pending), Arc::clone(&app.api)))
        .await;
    for cmd in commands {
        spawn_command(Arc::clone(&api), dispatcher.clone(), cmd);
    }
    true
}

fn spawn_event_reader(event_tx: mpsc::UnboundedSender<UiEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Ok(true) = event::poll(Duration::from_millis(10)) {
                match event::read() {
                    Ok(ev) => {
                        if event_tx.send(UiEvent::Crossterm(ev)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%err, "Failed to read terminal event");
                        continue;
                    }
                }
            } else {
                tokio::task::yield_now().await;
            }
        }
    })
}

pub async fn run_worksheet(launch: WorksheetLaunch) -> Result<(), Box<dyn Error>> {
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<AppActionEnvelope>();
    let action_dispatcher = AppActionDispatcher::new(action_tx);
    let (app, initial_commands) = bootstrap_app(launch, action_dispatcher.clone())?;

    let api = app.read(|app| Arc::clone(&app.api)).await;
    for cmd in initial_commands {
        spawn_command(Arc::clone(&api), action_dispatcher.clone(), cmd);
    }

    let terminal = setup_terminal()?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<UiEvent>();
    let event_reader_handle = spawn_event_reader(event_tx);

    let (store_watch, store_changed) = watch_store(&app).await;
    let mode_registry = build_mode_aware_registry();
    let mut chord = ChordState::default();

    const MAX_FPS: u64 = 60;
    let frame_duration = Duration::from_millis(1000 / MAX_FPS);
    let mut last_draw = Instant::now() - frame_duration;
    let mut request_redraw = true;

    let result: Result<(), Box<dyn Error>> = 'main_loop: loop {
        if is_exit_requested(&app).await {
            break 'main_loop Ok(());
        }

        if let Err(err) = try_draw_frame(
            &app,
            &terminal,
            &mut request_redraw,
            &mut last_draw,
            frame_duration,
        )
        .await
        {
            break 'main_loop Err(err.into());
        }

        let term_size = current_terminal_size(&terminal).await;
        let resized = app
            .update(|app| {
                let changed = app.ui.last_term_size != term_size;
                app.ui.last_term_size = term_size;
                changed
            })
            .await;
        if resized {
            request_redraw = true;
        }

        let event_outcome = process_ui_events(
            &app,
            &mut event_rx,
            &mode_registry,
            &action_dispatcher,
            &mut chord,
            term_size,
        )
        .await;

        if event_outcome.exit_requested {
            break 'main_loop Ok(());
        }
        if event_outcome.request_redraw {
            request_redraw = true;
        }

        let actions_applied = drain_action_queue(&app, &action_dispatcher, &mut action_rx).await;
        if actions_applied || store_changed.swap(false, Ordering::AcqRel) {
            request_redraw = true;
        }

        let now = Instant::now();
        let timers_fired = app
            .update(|app| app.ui.expire_toast(now) || app.ui.scroll.is_pending())
            .await;
        if timers_fired || chord.expire(now) {
            request_redraw = true;
        }

        let idle = !event_outcome.events_processed && !actions_applied && !request_redraw;
        if idle {
            tokio::time::sleep(Duration::from_millis(16)).await;
        }
    };

    event_reader_handle.abort();
    app.update(|app| {
        app.stop_poller();
        app.store.unsubscribe(store_watch);
    })
    .await;
    restore_terminal(&terminal).await?;

    result
}
