const APP_NAME: &str = "backdrop";

pub fn send(summary: &str, body: impl Into<String>) {
    let body = body.into();
    if let Err(err) = notify_rust::Notification::new()
        .appname(APP_NAME)
        .summary(summary)
        .body(&body)
        .show()
    {
        tracing::warn!("system notification failed: {err}");
    }
}

/// Tells the user their change is live but will not survive a restart.
pub fn storage_warning(detail: &str) {
    tracing::warn!(detail, "background settings not saved");
    send(
        "Background not saved",
        format!("The change is shown now but could not be stored: {detail}"),
    );
}
