//! Autonomy policy resolution.
//!
//! Decides how much rope an action kind gets for a given user: the
//! user's stored override if one exists, the kind's built-in default
//! otherwise. Resolution never fails; a broken settings lookup falls
//! back to the default rather than blocking the action.

use std::sync::Arc;

use tracing::warn;

use valet_core::types::{ActionKind, AutonomyLevel, AutonomySetting, UserId};
use valet_store::SettingsRepository;

pub struct PolicyResolver {
    settings: Arc<SettingsRepository>,
}

impl PolicyResolver {
    pub fn new(settings: Arc<SettingsRepository>) -> Self {
        Self { settings }
    }

    /// Effective autonomy level for one (user, kind).
    pub fn resolve(&self, user: &UserId, kind: ActionKind) -> AutonomyLevel {
        match self.settings.get(user, kind) {
            Ok(Some(setting)) => setting.level,
            Ok(None) => kind.default_autonomy(),
            Err(e) => {
                warn!(user = %user, kind = %kind, error = %e, "Autonomy lookup failed, using default");
                kind.default_autonomy()
            }
        }
    }

    /// Full effective setting for one (user, kind), stored or default.
    ///
    /// This is what the settings API reports back, so a user sees the
    /// defaults they have not overridden yet.
    pub fn resolve_setting(&self, user: &UserId, kind: ActionKind) -> AutonomySetting {
        match self.settings.get(user, kind) {
            Ok(Some(setting)) => setting,
            Ok(None) => AutonomySetting::default_for(user.clone(), kind),
            Err(e) => {
                warn!(user = %user, kind = %kind, error = %e, "Autonomy lookup failed, using default");
                AutonomySetting::default_for(user.clone(), kind)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use valet_core::types::Timestamp;
    use valet_store::Database;

    fn make_resolver() -> (PolicyResolver, Arc<SettingsRepository>, Arc<Database>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let settings = Arc::new(SettingsRepository::new(db.clone()));
        (PolicyResolver::new(settings.clone()), settings, db)
    }

    #[test]
    fn test_resolve_falls_back_to_kind_default() {
        let (resolver, _, _) = make_resolver();
        let user = UserId::new("alice");

        assert_eq!(
            resolver.resolve(&user, ActionKind::CalendarBlock),
            AutonomyLevel::High
        );
        assert_eq!(
            resolver.resolve(&user, ActionKind::StatusSet),
            AutonomyLevel::Medium
        );
        assert_eq!(
            resolver.resolve(&user, ActionKind::EmailSend),
            AutonomyLevel::Low
        );
    }

    #[test]
    fn test_stored_override_wins() {
        let (resolver, settings, _) = make_resolver();
        let user = UserId::new("alice");

        settings
            .upsert(&AutonomySetting {
                user_id: user.clone(),
                kind: ActionKind::EmailSend,
                level: AutonomyLevel::High,
                require_notification: true,
                require_confirmation: false,
                updated_at: Timestamp::now(),
            })
            .unwrap();

        assert_eq!(
            resolver.resolve(&user, ActionKind::EmailSend),
            AutonomyLevel::High
        );
        // Other kinds and other users keep their defaults.
        assert_eq!(
            resolver.resolve(&user, ActionKind::MessagePost),
            AutonomyLevel::Low
        );
        assert_eq!(
            resolver.resolve(&UserId::new("bob"), ActionKind::EmailSend),
            AutonomyLevel::Low
        );
    }

    #[test]
    fn test_any_level_assignable_to_any_kind() {
        let (resolver, settings, _) = make_resolver();
        let user = UserId::new("alice");

        // Even the chattiest kind can be locked down, and the riskiest
        // opened up.
        for (kind, level) in [
            (ActionKind::CalendarBlock, AutonomyLevel::Low),
            (ActionKind::MessagePost, AutonomyLevel::High),
        ] {
            settings
                .upsert(&AutonomySetting {
                    user_id: user.clone(),
                    kind,
                    level,
                    require_notification: true,
                    require_confirmation: false,
                    updated_at: Timestamp::now(),
                })
                .unwrap();
            assert_eq!(resolver.resolve(&user, kind), level);
        }
    }

    #[test]
    fn test_resolve_setting_reports_defaults() {
        let (resolver, _, _) = make_resolver();
        let setting = resolver.resolve_setting(&UserId::new("alice"), ActionKind::StatusSet);
        assert_eq!(setting.level, AutonomyLevel::Medium);
        assert!(setting.require_notification);
        assert!(!setting.require_confirmation);
    }

    #[test]
    fn test_resolve_setting_prefers_stored_row() {
        let (resolver, settings, _) = make_resolver();
        let user = UserId::new("alice");

        settings
            .upsert(&AutonomySetting {
                user_id: user.clone(),
                kind: ActionKind::StatusSet,
                level: AutonomyLevel::Low,
                require_notification: false,
                require_confirmation: true,
                updated_at: Timestamp(5_000),
            })
            .unwrap();

        let setting = resolver.resolve_setting(&user, ActionKind::StatusSet);
        assert_eq!(setting.level, AutonomyLevel::Low);
        assert!(!setting.require_notification);
        assert!(setting.require_confirmation);
        assert_eq!(setting.updated_at, Timestamp(5_000));
    }

    #[test]
    fn test_lookup_failure_falls_back_to_default() {
        let (resolver, _, db) = make_resolver();

        // Break the settings table out from under the resolver.
        db.with_conn(|conn| {
            conn.execute("DROP TABLE autonomy_settings", [])
                .map_err(|e| valet_core::ValetError::Storage(e.to_string()))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(
            resolver.resolve(&UserId::new("alice"), ActionKind::EmailSend),
            AutonomyLevel::Low
        );
        let setting = resolver.resolve_setting(&UserId::new("alice"), ActionKind::EmailSend);
        assert_eq!(setting.level, AutonomyLevel::Low);
    }
}
