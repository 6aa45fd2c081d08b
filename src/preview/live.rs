use std::time::{Duration, Instant};

use super::Debouncer;
use crate::resolver::{blur_filter, object_position, transform};
use crate::settings::{BackgroundSettings, Field};

/// Where the edit surface's thumbnail comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewSource {
    /// Transient handle for a picked local file; must be revoked when replaced or discarded.
    ObjectUrl(String),
    DataUri(String),
    Remote(String),
}

impl PreviewSource {
    pub fn url(&self) -> &str {
        match self {
            Self::ObjectUrl(url) | Self::DataUri(url) | Self::Remote(url) => url,
        }
    }

    pub fn object_url(&self) -> Option<&str> {
        match self {
            Self::ObjectUrl(url) => Some(url),
            Self::DataUri(_) | Self::Remote(_) => None,
        }
    }

    pub fn for_image_ref(image_ref: &str) -> Self {
        if image_ref.starts_with("data:") {
            Self::DataUri(image_ref.to_string())
        } else {
            Self::Remote(image_ref.to_string())
        }
    }
}

/// Styling of the edit surface's thumbnail.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewStyle {
    pub src: String,
    pub filter: String,
    pub opacity: f64,
    pub object_position: String,
    pub transform: String,
}

impl PreviewStyle {
    pub fn from_draft(settings: &BackgroundSettings, source: &PreviewSource) -> Self {
        Self {
            src: source.url().to_string(),
            filter: blur_filter(settings.blur_px),
            opacity: settings.opacity,
            object_position: object_position(settings.position_x_pct, settings.position_y_pct),
            transform: transform(settings.scale_pct, settings.rotation_deg),
        }
    }
}

/// The draft values mirrored onto the live page background.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveParams {
    pub blur_px: f64,
    pub opacity: f64,
}

impl LiveParams {
    pub fn from_settings(settings: &BackgroundSettings) -> Self {
        Self {
            blur_px: settings.blur_px,
            opacity: settings.opacity,
        }
    }

    pub fn apply_to(self, settings: &mut BackgroundSettings) {
        settings.set(Field::Blur, self.blur_px);
        settings.set(Field::Opacity, self.opacity);
    }
}

/// Debounces blur and opacity edits on their way to the committed background.
#[derive(Debug, Clone)]
pub struct LivePreviewSync {
    debouncer: Debouncer<LiveParams>,
}

impl LivePreviewSync {
    pub fn new(delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
        }
    }

    /// Records a draft edit. Returns whether a propagation was scheduled.
    pub fn on_draft_change(
        &mut self,
        field: Field,
        draft: &BackgroundSettings,
        now: Instant,
    ) -> bool {
        if !field.propagates_live() || !draft.has_image() {
            return false;
        }
        self.debouncer
            .schedule(LiveParams::from_settings(draft), now);
        true
    }

    /// Due propagation, if any. Dropped when the draft closed or lost its image meanwhile.
    pub fn take_due(&mut self, now: Instant, draft: Option<&BackgroundSettings>) -> Option<LiveParams> {
        let params = self.debouncer.poll(now)?;
        match draft {
            Some(draft) if draft.has_image() => Some(params),
            _ => {
                tracing::debug!("dropping live propagation for closed or imageless draft");
                None
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    pub fn cancel(&mut self) -> bool {
        self.debouncer.cancel()
    }
}
