//! Notification routing over medium presence.

use vigil_store::types::MediumPresence;

/// Where a notification should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// An online medium plus the chosen channel within it.
    Medium { medium: String, channel: Option<String> },
    /// No medium online but desktop notifications are allowed.
    Desktop,
    /// Nothing reachable; deliver nothing.
    None,
}

/// Pick a destination from the online mediums.
///
/// Channel preference inside a medium: DM-ish names first, then anything
/// containing "general", "main", or "chat", then the first available.
/// With no online medium, fall back to desktop unless the deployment routes
/// exclusively through the daemon (`notification_method == "daemon"`).
pub fn route(online: &[MediumPresence], notification_method: &str) -> Route {
    if online.is_empty() {
        return if notification_method != "daemon" {
            Route::Desktop
        } else {
            Route::None
        };
    }
    for presence in online {
        if let Some(channel) = presence.channels.iter().find(|c| is_dm(c)) {
            return Route::Medium {
                medium: presence.medium.clone(),
                channel: Some(channel.clone()),
            };
        }
    }
    for presence in online {
        if let Some(channel) = presence.channels.iter().find(|c| is_general(c)) {
            return Route::Medium {
                medium: presence.medium.clone(),
                channel: Some(channel.clone()),
            };
        }
    }
    let first = &online[0];
    Route::Medium {
        medium: first.medium.clone(),
        channel: first.channels.first().cloned(),
    }
}

fn is_dm(channel: &str) -> bool {
    let lower = channel.to_lowercase();
    lower == "dm" || lower.contains("private") || lower.contains("direct_message")
}

fn is_general(channel: &str) -> bool {
    let lower = channel.to_lowercase();
    lower.contains("general") || lower.contains("main") || lower.contains("chat")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn presence(medium: &str, channels: &[&str]) -> MediumPresence {
        MediumPresence {
            medium: medium.to_string(),
            user_id: "alice".to_string(),
            status: "online".to_string(),
            last_heartbeat: chrono::Utc::now().to_rfc3339(),
            channels: channels.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn dm_channels_win() {
        let online = [presence("discord", &["general", "dm", "random"])];
        match route(&online, "daemon") {
            Route::Medium { medium, channel } => {
                assert_eq!(medium, "discord");
                assert_eq!(channel.as_deref(), Some("dm"));
            }
            other => panic!("unexpected route: {other:?}"),
        }
    }

    #[test]
    fn general_beats_arbitrary() {
        let online = [presence("discord", &["random", "general"])];
        match route(&online, "daemon") {
            Route::Medium { channel, .. } => assert_eq!(channel.as_deref(), Some("general")),
            other => panic!("unexpected route: {other:?}"),
        }
    }

    #[test]
    fn first_channel_is_the_last_resort() {
        let online = [presence("slack", &["eng-infra"])];
        match route(&online, "daemon") {
            Route::Medium { channel, .. } => assert_eq!(channel.as_deref(), Some("eng-infra")),
            other => panic!("unexpected route: {other:?}"),
        }
    }

    #[test]
    fn offline_falls_back_to_desktop_unless_daemon_only() {
        assert_eq!(route(&[], "desktop"), Route::Desktop);
        assert_eq!(route(&[], "daemon"), Route::None);
    }
}
