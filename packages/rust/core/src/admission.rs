//! Per-user daily build quota: one committed build per UTC calendar day.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use coursebuilder_shared::{
    CourseBuilderError, MAX_BUILDS_PER_DAY_COUNTER, ProfileStore, QuotaState, Result, UserId,
};

/// Builds a user may commit per calendar day.
pub const DAILY_BUILD_LIMIT: u32 = 1;

/// Outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaCheck {
    pub allowed: bool,
    pub remaining: u32,
}

/// Evaluate `quota` against `today`.
///
/// Denies iff a build was already committed today.
pub fn check_quota(quota: &QuotaState, today: NaiveDate) -> QuotaCheck {
    let same_day = quota.last_build_date == Some(today);
    if same_day && quota.builds_today >= DAILY_BUILD_LIMIT {
        return QuotaCheck {
            allowed: false,
            remaining: 0,
        };
    }

    QuotaCheck {
        allowed: true,
        remaining: if same_day {
            DAILY_BUILD_LIMIT - quota.builds_today
        } else {
            DAILY_BUILD_LIMIT
        },
    }
}

/// The quota after committing one build on `today`.
pub fn next_quota(quota: &QuotaState, today: NaiveDate) -> QuotaState {
    if quota.last_build_date == Some(today) {
        QuotaState {
            last_build_date: Some(today),
            builds_today: (quota.builds_today + 1).min(MAX_BUILDS_PER_DAY_COUNTER),
        }
    } else {
        QuotaState {
            last_build_date: Some(today),
            builds_today: 1,
        }
    }
}

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

type InFlight = Arc<Mutex<HashSet<UserId>>>;

/// Admission control in front of the build pipeline.
///
/// Besides the stored quota, the gate keeps an in-process reservation per
/// user so two concurrent builds for the same user cannot both be admitted.
pub struct AdmissionGate {
    profiles: Arc<dyn ProfileStore>,
    in_flight: InFlight,
    clock: fn() -> NaiveDate,
}

impl AdmissionGate {
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            profiles,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            clock: utc_today,
        }
    }

    /// Replace the UTC clock, e.g. to pin "today" in tests.
    pub fn with_clock(mut self, clock: fn() -> NaiveDate) -> Self {
        self.clock = clock;
        self
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    /// Read-only quota check for `user_id`.
    pub async fn check(&self, user_id: &UserId) -> Result<QuotaCheck> {
        let profile = self.profiles.read_profile(user_id).await?;
        Ok(check_quota(&profile.quota, self.today()))
    }

    /// Reserve the user's slot and check the stored quota.
    ///
    /// Fails with [`CourseBuilderError::AdmissionDenied`] when the quota is
    /// used up or another build for the same user is still running.
    pub async fn admit(&self, user_id: &UserId) -> Result<AdmissionPermit> {
        let permit = self.reserve(user_id)?;
        let check = self.check(user_id).await?;
        if !check.allowed {
            info!(user = %user_id, "admission denied: daily quota used");
            return Err(CourseBuilderError::AdmissionDenied {
                remaining: check.remaining,
            });
        }
        debug!(user = %user_id, remaining = check.remaining, "admitted");
        Ok(permit)
    }

    fn reserve(&self, user_id: &UserId) -> Result<AdmissionPermit> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(user_id.clone()) {
            info!(user = %user_id, "admission denied: build already running");
            return Err(CourseBuilderError::AdmissionDenied { remaining: 0 });
        }
        Ok(AdmissionPermit {
            user_id: user_id.clone(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    /// Record the admitted build against today's quota.
    pub async fn commit(&self, permit: &AdmissionPermit) -> Result<QuotaState> {
        let quota = self
            .profiles
            .commit_quota(&permit.user_id, self.today())
            .await?;
        debug!(user = %permit.user_id, builds_today = quota.builds_today, "quota committed");
        Ok(quota)
    }
}

/// Reservation held for the duration of one build. Released on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    user_id: UserId,
    in_flight: InFlight,
}

impl AdmissionPermit {
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.user_id);
    }
}
