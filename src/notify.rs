use anyhow::Result;

const MAX_NOTIFICATION_LEN: usize = 256;

fn sanitize_notification_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n')
        .take(MAX_NOTIFICATION_LEN)
        .collect()
}

pub fn show_notification(title: &str, body: &str) -> Result<()> {
    let safe_title = sanitize_notification_text(title);
    let safe_body = sanitize_notification_text(body);

    let mut notification = notify_rust::Notification::new();
    notification.summary(&safe_title).body(&safe_body);

    #[cfg(not(target_os = "macos"))]
    notification.timeout(notify_rust::Timeout::Milliseconds(3000));

    notification.show()?;
    Ok(())
}

/// Shows a notification when enabled, logging instead of failing.
pub fn notify_if(enabled: bool, title: &str, body: &str) {
    if !enabled {
        return;
    }
    if let Err(e) = show_notification(title, body) {
        tracing::debug!("Notification failed: {}", e);
    }
}
