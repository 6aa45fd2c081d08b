mod debounce;
mod live;

pub use debounce::Debouncer;
pub use live::{LiveParams, LivePreviewSync, PreviewSource, PreviewStyle};

/// Releases transient object URLs handed out for local previews.
pub trait ObjectUrlRevoker {
    fn revoke(&mut self, url: &str);
}

/// For hosts that never create object URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObjectUrls;

impl ObjectUrlRevoker for NoObjectUrls {
    fn revoke(&mut self, url: &str) {
        tracing::debug!(url, "no object url registry; nothing to revoke");
    }
}
