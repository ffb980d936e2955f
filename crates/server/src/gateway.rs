//! External trigger dispatch.
//!
//! Sync, update, and push events arrive from schedulers the proxy does
//! not control, as an opaque tag plus an optional payload. Handlers are
//! dispatched by tag and every trigger is acknowledged: failures are
//! caught and logged at this boundary so a broken handler cannot take
//! the process down or push the scheduler into an endless retry loop.

use crate::lifecycle::LifecycleManager;
use outpost_core::Error;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// Deferred-work replay hook. Recognized and acknowledged; the proxy
/// holds no request queue to drain.
pub const TAG_BACKGROUND_SEARCH: &str = "background-search";
/// Periodic content refresh of the manifest.
pub const TAG_UPDATE: &str = "update";
/// Push message carrying an optional user-visible payload.
pub const TAG_PUSH: &str = "push";

/// One selectable action on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
}

/// What the host should surface to the user for a push trigger.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// Acknowledgement returned for every trigger, failed handlers included.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerAck {
    pub tag: String,
    pub handled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationDescriptor>,
}

impl TriggerAck {
    fn handled(tag: &str) -> Self {
        Self { tag: tag.to_string(), handled: true, notification: None }
    }

    fn unhandled(tag: &str) -> Self {
        Self { tag: tag.to_string(), handled: false, notification: None }
    }
}

/// Outcome of the user selecting a notification action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionDisposition {
    /// Navigate to the root document.
    OpenRoot(Url),
    /// Close the notification, nothing else.
    Dismiss,
}

/// Dispatches external triggers and shapes the notifications they raise.
pub struct NotificationGateway {
    lifecycle: Arc<LifecycleManager>,
    manifest: Vec<String>,
    title: String,
    root: Url,
}

impl NotificationGateway {
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        manifest: Vec<String>,
        title: String,
        root: Url,
    ) -> Self {
        Self { lifecycle, manifest, title, root }
    }

    /// Dispatch one trigger. Always acknowledges; handler errors stop here.
    pub async fn on_trigger(&self, tag: &str, payload: Option<&[u8]>) -> TriggerAck {
        match tag {
            TAG_BACKGROUND_SEARCH => {
                tracing::info!("background sync trigger acknowledged");
                TriggerAck::handled(tag)
            }
            TAG_UPDATE => match self.lifecycle.refresh(&self.manifest).await {
                Ok(refreshed) => {
                    tracing::info!("update trigger refreshed {} entries", refreshed);
                    TriggerAck::handled(tag)
                }
                Err(err) => {
                    let err = Error::TriggerFailed(err.to_string());
                    tracing::warn!("{}", err);
                    TriggerAck::unhandled(tag)
                }
            },
            TAG_PUSH => TriggerAck {
                tag: tag.to_string(),
                handled: true,
                notification: Some(self.build_notification(payload)),
            },
            other => {
                tracing::warn!("unknown trigger tag {:?}, acknowledged unhandled", other);
                TriggerAck::unhandled(other)
            }
        }
    }

    /// Payload text becomes the body; blank or absent payloads fall back to
    /// a stock message so the notification is never empty.
    fn build_notification(&self, payload: Option<&[u8]>) -> NotificationDescriptor {
        let body = payload
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "New content is available".to_string());

        NotificationDescriptor {
            title: self.title.clone(),
            body,
            actions: vec![
                NotificationAction { id: "open".to_string(), label: "View".to_string() },
                NotificationAction { id: "dismiss".to_string(), label: "Dismiss".to_string() },
            ],
        }
    }

    /// Resolve a selected action. `open` navigates to the root document;
    /// everything else, unknown ids included, just dismisses.
    pub fn resolve_action(&self, action_id: &str) -> ActionDisposition {
        match action_id {
            "open" => ActionDisposition::OpenRoot(self.root.clone()),
            _ => ActionDisposition::Dismiss,
        }
    }
}
