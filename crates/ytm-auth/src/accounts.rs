//! Account resolution for events that name a backend.

use serde::{Deserialize, Serialize};
use ytm_config::remove_trailing_slash;
use ytm_storage::{Storage, StorageState};

/// Find the sibling account a target backend refers to.
///
/// Returns `None` when the target is empty, is the active account, or is not
/// known at all. The first match in `others` wins.
pub fn find_target_account(
    active: &StorageState,
    others: &[StorageState],
    target_backend_url: &str,
) -> Option<StorageState> {
    let target = remove_trailing_slash(target_backend_url);
    if target.is_empty() || active.backend_url() == target {
        return None;
    }

    let mut matches = others.iter().filter(|account| account.backend_url() == target);
    let found = matches.next()?;
    if matches.next().is_some() {
        tracing::warn!(backend = target, "several accounts share a backend URL, using the first");
    }
    Some(found.clone())
}

/// Resolve a target backend against the accounts of a storage context.
pub fn resolve_target_account(storage: &Storage, target_backend_url: &str) -> Option<StorageState> {
    let state = storage.state();
    let account = find_target_account(&state, &state.other_accounts, target_backend_url);
    if let Some(account) = &account {
        tracing::info!(backend = account.backend_url(), "notification targets another account");
    }
    account
}

// ============================================================================
// Notifications
// ============================================================================

/// The parts of a push notification the session core cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, alias = "ytIssueId")]
    pub issue_id: Option<String>,

    #[serde(default)]
    pub backend_url: Option<String>,
}

/// What to do with an opened notification.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationRoute {
    /// Silent, or not about an issue.
    Ignore,
    /// Open the issue in the active account.
    OpenIssue { issue_id: String },
    /// Switch to `account`, then open the issue.
    SwitchAccount {
        account: Box<StorageState>,
        issue_id: String,
    },
}

/// Decide how an opened notification is handled.
pub fn route_notification(storage: &Storage, notification: &PushNotification) -> NotificationRoute {
    if notification.title.as_deref().is_none_or(str::is_empty) {
        tracing::info!("silent push notification received");
        return NotificationRoute::Ignore;
    }
    let Some(issue_id) = notification
        .issue_id
        .clone()
        .filter(|id| !id.is_empty())
    else {
        return NotificationRoute::Ignore;
    };

    let target = notification.backend_url.as_deref().unwrap_or("");
    match resolve_target_account(storage, target) {
        Some(account) => NotificationRoute::SwitchAccount {
            account: Box::new(account),
            issue_id,
        },
        None => NotificationRoute::OpenIssue { issue_id },
    }
}
