//! Owns every piece of background state and sequences user actions through it.
//!
//! Time is passed in by the caller (`now`) so the owner's loop decides when
//! debounced work fires.

use std::time::Instant;

use serde_json::json;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::ingest::{self, CompressionChoice, EncodedImage, ImageFile, IngestResult};
use crate::presentation::{DraftPresentation, PresentationError, PresentationStore};
use crate::preview::{LivePreviewSync, NoObjectUrls, ObjectUrlRevoker, PreviewSource, PreviewStyle};
use crate::resolver::{
    BackgroundResolver, BackgroundStyle, BackgroundSurface, Resolution, ResolverConfig,
    ResolverInputs,
};
use crate::settings::{BackgroundSettings, Field};
use crate::store::KeyValueStore;
use crate::theme::{self, ThemeError, ThemeRecord, ThemeSelection, ThemeStyle};

mod dispatch;
mod worker;

pub use self::dispatch::{Dispatcher, TracingDispatcher, THEME_ACTION};
pub use self::worker::ACTION_RESULT_POLL_INTERVAL;

use self::dispatch::{dispatch_live, dispatch_settings};
use self::worker::{spawn_worker_action, WorkerJob, WorkerPoll};

/// Outcome of [`App::begin_upload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStart {
    Started,
    /// The file is large enough that the caller must pick a [`CompressionChoice`] first.
    NeedsChoice { size: u64 },
    /// An upload is already in flight; the request was ignored.
    Busy,
}

pub struct App {
    store: Box<dyn KeyValueStore>,
    selection: ThemeSelection,
    query_theme: Option<&'static ThemeRecord>,
    default_stylesheet: String,
    presentation: PresentationStore,
    resolver: BackgroundResolver,
    live: LivePreviewSync,
    upload: Option<WorkerJob<IngestResult<EncodedImage>>>,
    dispatcher: Box<dyn Dispatcher>,
    surface: Box<dyn BackgroundSurface>,
}

impl App {
    pub fn new(
        config: &AppConfig,
        store: Box<dyn KeyValueStore>,
        surface: Box<dyn BackgroundSurface>,
    ) -> Self {
        let selection = ThemeSelection::load(&*store);
        let presentation = PresentationStore::load(&*store, Box::new(NoObjectUrls));
        Self {
            store,
            selection,
            query_theme: None,
            default_stylesheet: config.default_theme_stylesheet.clone(),
            presentation,
            resolver: BackgroundResolver::new(ResolverConfig::from_app_config(config)),
            live: LivePreviewSync::new(config.live_preview_debounce()),
            upload: None,
            dispatcher: Box::new(TracingDispatcher),
            surface,
        }
    }

    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Installs the revoker for transient preview URLs. Call before opening the editor.
    pub fn with_object_urls(mut self, revoker: Box<dyn ObjectUrlRevoker>) -> Self {
        self.presentation = PresentationStore::new(self.presentation.committed().clone(), revoker);
        self
    }

    pub fn committed(&self) -> &BackgroundSettings {
        self.presentation.committed()
    }

    pub fn selection(&self) -> &ThemeSelection {
        &self.selection
    }

    pub fn draft(&self) -> Option<&DraftPresentation> {
        self.presentation.draft()
    }

    pub fn preview_style(&self) -> Option<PreviewStyle> {
        self.presentation.preview_style()
    }

    /// The theme styling this page: the query theme, else the stored one, else the default.
    pub fn active_theme(&self) -> &'static ThemeRecord {
        self.query_theme
            .or_else(|| self.selection.theme())
            .unwrap_or_else(theme::default_theme)
    }

    pub fn theme_style(&self) -> ThemeStyle {
        self.active_theme().style(&self.default_stylesheet)
    }

    pub fn current_style(&self) -> Option<&BackgroundStyle> {
        self.resolver.last_applied()
    }

    pub fn is_uploading(&self) -> bool {
        self.upload.is_some()
    }

    /// Deadline of the pending live propagation, for scheduling the next [`App::tick`].
    pub fn next_deadline(&self) -> Option<Instant> {
        self.live.deadline()
    }

    pub fn into_store(self) -> Box<dyn KeyValueStore> {
        self.store
    }

    /// Styles a freshly loaded page. `query` is the location search string, if any.
    pub fn start(&mut self, query: Option<&str>) -> Resolution {
        self.query_theme = query.and_then(theme::from_query);
        if let Some(theme) = self.query_theme {
            tracing::info!(theme = theme.name, "theme requested by location query");
        }
        tracing::info!(
            has_image = self.committed().has_image(),
            theme = %self.selection.theme_name,
            "resolving background for initial load"
        );
        self.resolve_with(true)
    }

    /// An explicit swatch click: drops any custom image and makes the theme authoritative.
    pub fn select_theme(&mut self, name: &str) -> AppResult<Resolution> {
        if theme::find(name).is_none() {
            return Err(ThemeError::UnknownTheme(name.to_string()).into());
        }
        self.live.cancel();
        self.upload = None;

        let cleared = self
            .presentation
            .clear(&mut *self.store, &mut self.selection);
        let activated = self.selection.activate(name, &mut *self.store);
        self.query_theme = None;

        dispatch_settings(self.dispatcher.as_mut(), self.presentation.committed());
        self.dispatcher.dispatch(THEME_ACTION, json!(name));
        let resolution = self.resolve();

        cleared?;
        activated?;
        Ok(resolution)
    }

    /// Opens the edit surface on a copy of the committed settings.
    pub fn open_background_editor(&mut self) -> &DraftPresentation {
        self.live.cancel();
        if self.upload.take().is_some() {
            tracing::debug!("abandoning upload of the previous draft");
        }
        self.presentation.open_draft()
    }

    /// Points the draft at a remote image.
    pub fn set_draft_url(&mut self, url: &str) -> AppResult<()> {
        let encoded = ingest::ingest_url(url)?;
        let preview = PreviewSource::Remote(encoded.image_ref.clone());
        self.presentation.set_draft_image(encoded.image_ref, preview)?;
        Ok(())
    }

    /// Shows a picked local file on the edit surface before ingestion finishes.
    pub fn preview_object_url(&mut self, url: impl Into<String>) -> AppResult<()> {
        self.presentation
            .set_preview_source(PreviewSource::ObjectUrl(url.into()))?;
        Ok(())
    }

    /// Validates `file` and starts ingesting it on a worker thread.
    pub fn begin_upload(
        &mut self,
        file: ImageFile,
        choice: Option<CompressionChoice>,
    ) -> AppResult<UploadStart> {
        if !self.presentation.is_editing() {
            return Err(PresentationError::DraftClosed.into());
        }
        if self.upload.is_some() {
            tracing::debug!("upload already in flight; ignoring request");
            return Ok(UploadStart::Busy);
        }
        if let Err(err) = ingest::validate_file(&file) {
            self.presentation.restore_preview();
            return Err(err.into());
        }
        let size = file.size();
        if choice.is_none() && ingest::needs_choice(size) {
            return Ok(UploadStart::NeedsChoice { size });
        }

        tracing::info!(size, mime = %file.mime, ?choice, "starting image ingestion");
        self.upload = Some(spawn_worker_action(move || ingest::ingest_file(&file, choice)));
        Ok(UploadStart::Started)
    }

    /// Collects a finished upload. `None` while nothing has finished.
    pub fn poll_upload(&mut self) -> Option<AppResult<EncodedImage>> {
        let poll = self.upload.as_ref()?.poll();
        let result = match poll {
            WorkerPoll::Pending => return None,
            WorkerPoll::Done(result) => result,
            WorkerPoll::Disconnected => {
                self.upload = None;
                self.presentation.restore_preview();
                tracing::error!("image worker disconnected");
                return Some(Err(AppError::WorkerDisconnected));
            }
        };
        self.upload = None;

        let outcome = result.map_err(AppError::from).and_then(|encoded| {
            let preview = PreviewSource::for_image_ref(&encoded.image_ref);
            self.presentation
                .set_draft_image(encoded.image_ref.clone(), preview)?;
            Ok(encoded)
        });
        if let Err(err) = &outcome {
            tracing::warn!(%err, "image ingestion failed");
            self.presentation.restore_preview();
        }
        Some(outcome)
    }

    /// Stores a draft value and schedules live propagation for blur and opacity.
    pub fn update_draft_field(&mut self, field: Field, value: f64, now: Instant) -> AppResult<f64> {
        let stored = self.presentation.update_draft_field(field, value)?;
        if let Some(draft) = self.presentation.draft_settings() {
            self.live.on_draft_change(field, draft, now);
        }
        Ok(stored)
    }

    /// Fires a due live propagation. Returns the resolution when one fired.
    pub fn tick(&mut self, now: Instant) -> Option<Resolution> {
        let params = self
            .live
            .take_due(now, self.presentation.draft_settings())?;
        if !self.presentation.apply_live(params) {
            return None;
        }
        dispatch_live(self.dispatcher.as_mut(), self.presentation.committed());
        Some(self.resolve())
    }

    /// Commits the draft, persists it and restyles the page.
    ///
    /// A storage failure is returned after the page has been restyled.
    pub fn confirm_background(&mut self) -> AppResult<Resolution> {
        if self.upload.is_some() {
            return Err(AppError::UploadInProgress);
        }
        self.live.cancel();
        let committed = self.presentation.commit(&mut *self.store);
        let persisted = match committed {
            Ok(_) => Ok(()),
            Err(err @ PresentationError::StorageWriteFailed(_)) => Err(err),
            Err(err) => return Err(err.into()),
        };

        dispatch_settings(self.dispatcher.as_mut(), self.presentation.committed());
        let resolution = self.resolve();
        persisted?;
        Ok(resolution)
    }

    /// Closes the edit surface without saving; live-propagated values are rolled back.
    pub fn cancel_background_editor(&mut self) -> Resolution {
        self.live.cancel();
        self.upload = None;
        if self.presentation.discard() {
            dispatch_live(self.dispatcher.as_mut(), self.presentation.committed());
        }
        self.resolve()
    }

    /// Removes the custom background and the theme activation flag.
    pub fn clear_background(&mut self) -> AppResult<Resolution> {
        self.live.cancel();
        self.upload = None;
        let cleared = self
            .presentation
            .clear(&mut *self.store, &mut self.selection);

        dispatch_settings(self.dispatcher.as_mut(), self.presentation.committed());
        let resolution = self.resolve();
        cleared?;
        Ok(resolution)
    }

    fn resolve(&mut self) -> Resolution {
        self.resolve_with(false)
    }

    fn resolve_with(&mut self, is_initial_load: bool) -> Resolution {
        let inputs = ResolverInputs {
            settings: self.presentation.committed(),
            selection: &self.selection,
            query_theme: self.query_theme,
            is_initial_load,
        };
        self.resolver.run(&inputs, self.surface.as_mut())
    }
}
