//! Committed background settings and the draft edited on top of them.
//!
//! `commit` and `clear` are the only operations that reach the persisted store.

use thiserror::Error;

use crate::preview::{LiveParams, ObjectUrlRevoker, PreviewSource, PreviewStyle};
use crate::settings::{BackgroundSettings, Field};
use crate::store::{KeyValueStore, StoreError};
use crate::theme::ThemeSelection;

#[derive(Debug, Error)]
pub enum PresentationError {
    #[error("no background image selected")]
    NoImageSelected,
    #[error("no background draft is open")]
    DraftClosed,
    /// The in-memory state was updated; only persistence failed.
    #[error("background settings were applied but could not be saved")]
    StorageWriteFailed(#[source] StoreError),
}

pub type PresentationResult<T> = std::result::Result<T, PresentationError>;

/// Scratch copy of the settings while the edit surface is open.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftPresentation {
    pub settings: BackgroundSettings,
    pub preview_source: Option<PreviewSource>,
}

#[derive(Debug, Clone)]
struct OpenDraft {
    presentation: DraftPresentation,
    // Committed settings at open time; live propagation may have touched `committed` since.
    baseline: BackgroundSettings,
    // Preview shown before a transient source was staged; restored if ingestion fails.
    stashed_preview: Option<Option<PreviewSource>>,
}

pub struct PresentationStore {
    committed: BackgroundSettings,
    draft: Option<OpenDraft>,
    revoker: Box<dyn ObjectUrlRevoker>,
}

impl PresentationStore {
    pub fn new(committed: BackgroundSettings, revoker: Box<dyn ObjectUrlRevoker>) -> Self {
        Self {
            committed: committed.normalized(),
            draft: None,
            revoker,
        }
    }

    pub fn load<S: KeyValueStore + ?Sized>(store: &S, revoker: Box<dyn ObjectUrlRevoker>) -> Self {
        Self::new(BackgroundSettings::load(store), revoker)
    }

    pub fn committed(&self) -> &BackgroundSettings {
        &self.committed
    }

    pub fn draft(&self) -> Option<&DraftPresentation> {
        self.draft.as_ref().map(|draft| &draft.presentation)
    }

    pub fn draft_settings(&self) -> Option<&BackgroundSettings> {
        self.draft().map(|draft| &draft.settings)
    }

    pub fn is_editing(&self) -> bool {
        self.draft.is_some()
    }

    /// Copies committed settings into a fresh draft. Reopening drops the previous draft.
    pub fn open_draft(&mut self) -> &DraftPresentation {
        if self.draft.is_some() {
            self.discard();
        }
        tracing::debug!(has_image = self.committed.has_image(), "background draft opened");
        let draft = self.draft.insert(OpenDraft {
            presentation: DraftPresentation {
                settings: self.committed.clone(),
                preview_source: None,
            },
            baseline: self.committed.clone(),
            stashed_preview: None,
        });
        &draft.presentation
    }

    /// Clamps `value` into the field's range and stores it in the draft.
    pub fn update_draft_field(&mut self, field: Field, value: f64) -> PresentationResult<f64> {
        let draft = self.draft.as_mut().ok_or(PresentationError::DraftClosed)?;
        let stored = draft.presentation.settings.set(field, value);
        if stored != value {
            tracing::debug!(?field, requested = value, stored, "draft value clamped");
        }
        Ok(stored)
    }

    /// Points the draft at a new image and its preview.
    pub fn set_draft_image(
        &mut self,
        image_ref: impl Into<String>,
        preview: PreviewSource,
    ) -> PresentationResult<()> {
        let image_ref = image_ref.into();
        let draft = self.draft.as_mut().ok_or(PresentationError::DraftClosed)?;
        draft.presentation.settings.image_ref = Some(image_ref);
        let previous = draft.presentation.preview_source.replace(preview);
        let stashed = draft.stashed_preview.take().flatten();
        self.release(previous);
        self.release(stashed);
        Ok(())
    }

    /// Shows a transient source (typically an object URL) while the real image is prepared.
    ///
    /// The preview it replaces is kept until [`set_draft_image`](Self::set_draft_image)
    /// accepts the new image or [`restore_preview`](Self::restore_preview) brings it back.
    pub fn set_preview_source(&mut self, preview: PreviewSource) -> PresentationResult<()> {
        let draft = self.draft.as_mut().ok_or(PresentationError::DraftClosed)?;
        let previous = draft.presentation.preview_source.replace(preview);
        let replaced = if draft.stashed_preview.is_none() {
            draft.stashed_preview = Some(previous);
            None
        } else {
            previous
        };
        self.release(replaced);
        Ok(())
    }

    /// Drops a staged transient source after a rejected ingestion and shows the
    /// preview from before it. Returns whether anything was restored.
    pub fn restore_preview(&mut self) -> bool {
        let Some(draft) = self.draft.as_mut() else {
            return false;
        };
        let Some(stashed) = draft.stashed_preview.take() else {
            return false;
        };
        let rejected = std::mem::replace(&mut draft.presentation.preview_source, stashed);
        self.release(rejected);
        tracing::debug!("staged preview rejected; previous preview restored");
        true
    }

    pub fn preview_style(&self) -> Option<PreviewStyle> {
        let draft = self.draft()?;
        let source = match &draft.preview_source {
            Some(source) => source.clone(),
            None => PreviewSource::for_image_ref(draft.settings.image()?),
        };
        Some(PreviewStyle::from_draft(&draft.settings, &source))
    }

    /// Mirrors debounced blur/opacity onto committed state, in memory only.
    ///
    /// Returns whether committed state changed.
    pub fn apply_live(&mut self, params: LiveParams) -> bool {
        if self.draft.is_none() || !self.committed.has_image() {
            return false;
        }
        let before = LiveParams::from_settings(&self.committed);
        params.apply_to(&mut self.committed);
        LiveParams::from_settings(&self.committed) != before
    }

    /// Promotes the draft to committed and writes all seven keys.
    ///
    /// On [`PresentationError::StorageWriteFailed`] the committed state has still moved.
    pub fn commit<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
    ) -> PresentationResult<&BackgroundSettings> {
        let draft = self.draft.as_ref().ok_or(PresentationError::DraftClosed)?;
        let image = draft
            .presentation
            .settings
            .image()
            .or_else(|| draft.baseline.image())
            .ok_or(PresentationError::NoImageSelected)?
            .to_string();

        let Some(draft) = self.draft.take() else {
            return Err(PresentationError::DraftClosed);
        };
        let mut next = draft.presentation.settings.clone();
        next.image_ref = Some(image);
        self.committed = next.normalized();
        self.release_draft(draft);
        tracing::info!(
            image_bytes = self.committed.image().map_or(0, str::len),
            blur = self.committed.blur_px,
            opacity = self.committed.opacity,
            "background committed"
        );

        if let Err(err) = self.committed.persist(store) {
            tracing::warn!(?err, "background committed in memory but not persisted");
            return Err(PresentationError::StorageWriteFailed(err));
        }
        Ok(&self.committed)
    }

    /// Drops the draft and restores committed settings to their state at open time.
    ///
    /// Returns whether there was a draft to drop.
    pub fn discard(&mut self) -> bool {
        let Some(draft) = self.draft.take() else {
            return false;
        };
        self.committed = draft.baseline.clone();
        self.release_draft(draft);
        tracing::debug!("background draft discarded");
        true
    }

    /// Resets to defaults, removes the persisted keys and the theme activation flag.
    pub fn clear<S: KeyValueStore + ?Sized>(
        &mut self,
        store: &mut S,
        selection: &mut ThemeSelection,
    ) -> PresentationResult<()> {
        if let Some(draft) = self.draft.take() {
            self.release_draft(draft);
        }
        self.committed = BackgroundSettings::default();
        tracing::info!("background cleared");

        // Both removals run so the in-memory flag drops even when the store refuses.
        let removed = BackgroundSettings::remove_persisted(store);
        let unflagged = selection.clear_activation(store);
        removed
            .and(unflagged)
            .map_err(PresentationError::StorageWriteFailed)
    }

    fn release_draft(&mut self, draft: OpenDraft) {
        self.release(draft.presentation.preview_source);
        self.release(draft.stashed_preview.flatten());
    }

    fn release(&mut self, source: Option<PreviewSource>) {
        if let Some(url) = source.as_ref().and_then(PreviewSource::object_url) {
            self.revoker.revoke(url);
        }
    }
}
