//! Per-user notification preferences.

use serde::{Deserialize, Serialize};

/// Opt-in flags for order status notifications.
///
/// A user without a stored record gets the channel defaults: email
/// updates on, SMS updates off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub email_order_updates: bool,
    pub sms_order_updates: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_order_updates: true,
            sms_order_updates: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_defaults() {
        let prefs = NotificationPreferences::default();
        assert!(prefs.email_order_updates);
        assert!(!prefs.sms_order_updates);
    }
}
