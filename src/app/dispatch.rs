use serde_json::{json, Value};

use crate::settings::{BackgroundSettings, Field, IMAGE_URL_ACTION};

pub const THEME_ACTION: &str = "setUiTheme";

/// Fire-and-forget notifications mirrored into host-wide state.
pub trait Dispatcher {
    fn dispatch(&mut self, action: &str, payload: Value);
}

/// Logs every action; for hosts without a state container.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl Dispatcher for TracingDispatcher {
    fn dispatch(&mut self, action: &str, payload: Value) {
        tracing::debug!(action, %payload, "dispatch");
    }
}

pub(super) fn dispatch_settings(dispatcher: &mut dyn Dispatcher, settings: &BackgroundSettings) {
    dispatcher.dispatch(IMAGE_URL_ACTION, json!(settings.image().unwrap_or("")));
    for field in Field::ALL {
        dispatcher.dispatch(field.action_name(), json!(settings.get(field)));
    }
}

pub(super) fn dispatch_live(dispatcher: &mut dyn Dispatcher, settings: &BackgroundSettings) {
    for field in Field::ALL.into_iter().filter(|field| field.propagates_live()) {
        dispatcher.dispatch(field.action_name(), json!(settings.get(field)));
    }
}
