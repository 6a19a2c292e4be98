use std::error::Error;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::{AppHandle, WorksheetLaunch};
use crate::core::app::{App, AppActionDispatcher, AppCommand, AppInit};
use crate::core::clipboard::OriginStore;

/// Build the application state for the session. Returns the handle plus
/// the commands that load the first worksheet and the signed-in user.
pub fn bootstrap_app(
    launch: WorksheetLaunch,
    dispatcher: AppActionDispatcher,
) -> Result<(AppHandle, Vec<AppCommand>), Box<dyn Error>> {
    let origin = OriginStore::for_server(&launch.server_url)?;
    Ok(build_app(launch, origin, dispatcher))
}

fn build_app(
    launch: WorksheetLaunch,
    origin: OriginStore,
    dispatcher: AppActionDispatcher,
) -> (AppHandle, Vec<AppCommand>) {
    let WorksheetLaunch {
        config,
        api,
        server_url,
        worksheet,
    } = launch;
    info!(server = %server_url, %worksheet, "Starting worksheet session");

    let mut app = App::new(AppInit::from_config(&config, api, server_url, origin));
    let open = app.open_worksheet(&worksheet, true);
    app.attach_dispatcher(dispatcher);

    (
        AppHandle::new(Arc::new(Mutex::new(app))),
        vec![open, AppCommand::FetchUser],
    )
}
