use tracing::debug;
use uuid::Uuid;

use super::repo::ProfileStore;
use super::repo_types::Profile;

/// Finds the profile that drives suggestions for `user_id`.
///
/// The pointer on the user record wins, but is re-read scoped to the user so a
/// stale or foreign id never leaks another user's profile. Otherwise the most
/// recently updated active profile is used. `Ok(None)` is a normal outcome.
pub async fn resolve_active_profile(
    store: &dyn ProfileStore,
    user_id: Uuid,
) -> anyhow::Result<Option<Profile>> {
    if let Some(profile_id) = store.active_profile_pointer(user_id).await? {
        if let Some(profile) = store.find_owned(profile_id, user_id).await? {
            debug!(%user_id, profile_id = %profile.id, "resolved profile from user pointer");
            return Ok(Some(profile));
        }
        debug!(%user_id, %profile_id, "profile pointer did not resolve, falling back");
    }

    let profile = store.latest_active(user_id).await?;
    match &profile {
        Some(p) => debug!(%user_id, profile_id = %p.id, "resolved latest active profile"),
        None => debug!(%user_id, "user has no active profile"),
    }
    Ok(profile)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::{Duration, OffsetDateTime};

    use super::*;
    use crate::mealplans::repo_types::{DietTag, GoalType};
    use crate::profiles::repo_types::UnitSystem;

    pub(crate) fn profile(user_id: Uuid, prefs: &[DietTag], goal: Option<GoalType>) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            user_id,
            name: "Sam".into(),
            age: Some(31),
            weight: Some(70.0),
            height: Some(175.0),
            dietary_preferences: prefs.to_vec(),
            goal,
            unit_system: UnitSystem::Metric,
            calorie_target: None,
            allergies: Vec::new(),
            gender: None,
            is_active: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    /// In-memory profiles plus per-user pointers.
    #[derive(Default)]
    pub(crate) struct MemoryProfiles {
        pub profiles: Vec<Profile>,
        pub pointers: Vec<(Uuid, Uuid)>,
        pub calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ProfileStore for MemoryProfiles {
        async fn active_profile_pointer(&self, user_id: Uuid) -> anyhow::Result<Option<Uuid>> {
            self.calls.lock().unwrap().push("pointer");
            Ok(self
                .pointers
                .iter()
                .find(|(u, _)| *u == user_id)
                .map(|(_, p)| *p))
        }

        async fn find_owned(&self, profile_id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
            self.calls.lock().unwrap().push("find_owned");
            Ok(self
                .profiles
                .iter()
                .find(|p| p.id == profile_id && p.user_id == user_id)
                .cloned())
        }

        async fn latest_active(&self, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
            self.calls.lock().unwrap().push("latest_active");
            let mut mine: Vec<_> = self
                .profiles
                .iter()
                .filter(|p| p.user_id == user_id && p.is_active)
                .collect();
            mine.sort_by(|a, b| {
                b.updated_at
                    .cmp(&a.updated_at)
                    .then(b.created_at.cmp(&a.created_at))
            });
            Ok(mine.first().map(|p| (*p).clone()))
        }
    }

    #[tokio::test]
    async fn pointer_profile_wins() {
        let user = Uuid::new_v4();
        let pointed = profile(user, &[DietTag::Vegan], Some(GoalType::GainMuscle));
        let mut newer = profile(user, &[], None);
        newer.updated_at = OffsetDateTime::UNIX_EPOCH + Duration::days(3);
        let store = MemoryProfiles {
            pointers: vec![(user, pointed.id)],
            profiles: vec![pointed.clone(), newer],
            ..Default::default()
        };

        let got = resolve_active_profile(&store, user).await.unwrap().unwrap();
        assert_eq!(got.id, pointed.id);
        assert_eq!(*store.calls.lock().unwrap(), vec!["pointer", "find_owned"]);
    }

    #[tokio::test]
    async fn foreign_pointer_falls_back_to_latest_active() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let foreign = profile(other, &[DietTag::Halal], None);
        let mut old = profile(user, &[DietTag::Kosher], None);
        old.updated_at = OffsetDateTime::UNIX_EPOCH + Duration::days(1);
        let mut recent = profile(user, &[DietTag::Vegan], None);
        recent.updated_at = OffsetDateTime::UNIX_EPOCH + Duration::days(2);
        let store = MemoryProfiles {
            pointers: vec![(user, foreign.id)],
            profiles: vec![foreign, old, recent.clone()],
            ..Default::default()
        };

        let got = resolve_active_profile(&store, user).await.unwrap().unwrap();
        assert_eq!(got.id, recent.id);
    }

    #[tokio::test]
    async fn inactive_profiles_are_ignored() {
        let user = Uuid::new_v4();
        let mut inactive = profile(user, &[DietTag::Vegan], None);
        inactive.is_active = false;
        let store = MemoryProfiles {
            profiles: vec![inactive],
            ..Default::default()
        };

        assert!(resolve_active_profile(&store, user).await.unwrap().is_none());
        assert_eq!(*store.calls.lock().unwrap(), vec!["pointer", "latest_active"]);
    }
}
