use crate::config::VerificationConfig;
use crate::entities::{
    VerificationRecord, email_verification_entity as codes,
    email_verification_send_entity as sends,
};
use crate::error::{AppError, AppResult};
use crate::models::{PaginationParams, Throttle};
use crate::utils::generate_six_digit_code;
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait, UpdateResult,
};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Mutex;

const LOCK_STRIPES: usize = 64;

/// Timing rules applied to verification codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub code_ttl: Duration,
    pub resend_cooldown: Duration,
    pub max_codes_per_window: u64,
    pub rate_window: Duration,
}

/// Upper bound for every policy span and for cleanup retention.
pub const MAX_POLICY_SPAN_SECS: i64 = 10 * 365 * 24 * 3600;

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(5),
            resend_cooldown: Duration::seconds(60),
            max_codes_per_window: 3,
            rate_window: Duration::hours(1),
        }
    }
}

fn policy_span(name: &str, secs: i64) -> AppResult<Duration> {
    Duration::try_seconds(secs)
        .filter(|_| (0..=MAX_POLICY_SPAN_SECS).contains(&secs))
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "verification.{name} must be between 0 and {MAX_POLICY_SPAN_SECS}, got {secs}"
            ))
        })
}

impl TryFrom<&VerificationConfig> for VerificationPolicy {
    type Error = AppError;

    fn try_from(config: &VerificationConfig) -> AppResult<Self> {
        Ok(Self {
            code_ttl: policy_span("code_ttl_secs", config.code_ttl_secs)?,
            resend_cooldown: policy_span("resend_cooldown_secs", config.resend_cooldown_secs)?,
            max_codes_per_window: config.max_codes_per_window,
            rate_window: policy_span("rate_window_secs", config.rate_window_secs)?,
        })
    }
}

/// Issues, checks, throttles and expires email verification codes.
///
/// Every `*_at` method takes the current time explicitly; the plain variants
/// call them with `Utc::now()`.
#[derive(Clone)]
pub struct VerificationCodeStore {
    pool: DatabaseConnection,
    policy: VerificationPolicy,
    // create_verification runs count, delete and insert under the stripe
    // for its email, so concurrent requests in this process cannot
    // interleave and leave two unverified codes behind.
    locks: Arc<Vec<Mutex<()>>>,
}

impl VerificationCodeStore {
    pub fn new(pool: DatabaseConnection, policy: VerificationPolicy) -> Self {
        let locks = (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect();
        Self {
            pool,
            policy,
            locks: Arc::new(locks),
        }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    fn lock_for(&self, email: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        email.hash(&mut hasher);
        &self.locks[(hasher.finish() as usize) % self.locks.len()]
    }

    pub async fn create_verification(&self, email: &str) -> AppResult<VerificationRecord> {
        self.create_verification_at(email, Utc::now()).await
    }

    /// Issue a fresh code for `email`, superseding any unverified one.
    ///
    /// Fails with `RateLimitExceeded` once `max_codes_per_window` codes were
    /// issued inside the rolling window.
    pub async fn create_verification_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<VerificationRecord> {
        let _guard = self.lock_for(email).lock().await;
        let txn = self.pool.begin().await?;

        // 1. hourly quota
        if let Throttle::Denied { wait_seconds } = self.rate_limit_status(&txn, email, now).await? {
            log::info!("Verification quota reached for {email}, retry in {wait_seconds}s");
            return Err(AppError::RateLimitExceeded { wait_seconds });
        }

        // 2. only the newest code stays valid
        let superseded = codes::Entity::delete_many()
            .filter(codes::Column::Email.eq(email))
            .filter(codes::Column::IsVerified.eq(false))
            .exec(&txn)
            .await?
            .rows_affected;

        // 3. new code plus its quota entry
        let record = codes::ActiveModel {
            email: Set(email.to_string()),
            code: Set(generate_six_digit_code()),
            created_at: Set(now),
            is_verified: Set(false),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        sends::ActiveModel {
            email: Set(email.to_string()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        log::debug!(
            "Issued verification code {} for {email} (superseded {superseded})",
            record.id
        );
        Ok(record)
    }

    pub async fn check_code(&self, email: &str, code: &str) -> AppResult<VerificationRecord> {
        self.check_code_at(email, code, Utc::now()).await
    }

    /// Consume `code` for `email`. Succeeds at most once per code.
    ///
    /// `InvalidCode` when nothing unverified matches, `CodeExpired` when the
    /// match is past its TTL.
    pub async fn check_code_at(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> AppResult<VerificationRecord> {
        let record = codes::Entity::find()
            .filter(codes::Column::Email.eq(email))
            .filter(codes::Column::Code.eq(code))
            .filter(codes::Column::IsVerified.eq(false))
            .order_by_desc(codes::Column::CreatedAt)
            .order_by_desc(codes::Column::Id)
            .one(&self.pool)
            .await?
            .ok_or(AppError::InvalidCode)?;

        if record.is_expired_at(now, self.policy.code_ttl) {
            return Err(AppError::CodeExpired);
        }

        // Flip only if still unverified; a concurrent check that won the
        // race leaves nothing to update.
        let result: UpdateResult = codes::Entity::update_many()
            .col_expr(codes::Column::IsVerified, Expr::value(true))
            .filter(codes::Column::Id.eq(record.id))
            .filter(codes::Column::IsVerified.eq(false))
            .exec(&self.pool)
            .await?;

        if result.rows_affected != 1 {
            return Err(AppError::InvalidCode);
        }

        log::info!("Email {email} verified");
        Ok(VerificationRecord {
            is_verified: true,
            ..record
        })
    }

    pub async fn can_resend(&self, email: &str) -> AppResult<Throttle> {
        self.can_resend_at(email, Utc::now()).await
    }

    /// Cooldown between consecutive codes for one email.
    pub async fn can_resend_at(&self, email: &str, now: DateTime<Utc>) -> AppResult<Throttle> {
        let latest = codes::Entity::find()
            .filter(codes::Column::Email.eq(email))
            .order_by_desc(codes::Column::CreatedAt)
            .one(&self.pool)
            .await?;

        let Some(latest) = latest else {
            return Ok(Throttle::Allowed);
        };

        let cooldown = self.policy.resend_cooldown;
        let age = now - latest.created_at;
        if age >= cooldown {
            return Ok(Throttle::Allowed);
        }

        // Round up so a denial never reports 0; clock skew can make the age
        // negative, which is capped at the full cooldown.
        let remaining_ms = (cooldown - age).num_milliseconds();
        let wait_seconds = ((remaining_ms + 999) / 1000).clamp(1, cooldown.num_seconds().max(1));
        Ok(Throttle::Denied { wait_seconds })
    }

    pub async fn check_rate_limit(&self, email: &str) -> AppResult<Throttle> {
        self.check_rate_limit_at(email, Utc::now()).await
    }

    pub async fn check_rate_limit_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Throttle> {
        self.rate_limit_status(&self.pool, email, now).await
    }

    async fn rate_limit_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        email: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Throttle> {
        let window = self.policy.rate_window;
        let in_window = sends::Entity::find()
            .filter(sends::Column::Email.eq(email))
            .filter(sends::Column::CreatedAt.gte(now - window));

        let issued = in_window.clone().count(conn).await?;
        if issued < self.policy.max_codes_per_window {
            return Ok(Throttle::Allowed);
        }

        let oldest = in_window
            .order_by_asc(sends::Column::CreatedAt)
            .one(conn)
            .await?;
        let wait_seconds = match oldest {
            Some(send) => (send.created_at + window - now).num_seconds().max(0),
            None => window.num_seconds(),
        };
        Ok(Throttle::Denied { wait_seconds })
    }

    /// True once any code for `email` has been consumed.
    pub async fn is_email_verified(&self, email: &str) -> AppResult<bool> {
        let verified = codes::Entity::find()
            .filter(codes::Column::Email.eq(email))
            .filter(codes::Column::IsVerified.eq(true))
            .count(&self.pool)
            .await?;
        Ok(verified > 0)
    }

    pub async fn cleanup(&self, older_than_hours: i64) -> AppResult<u64> {
        self.cleanup_at(older_than_hours, Utc::now()).await
    }

    /// Delete codes created strictly before `now - older_than_hours`.
    /// Returns the number of codes removed.
    pub async fn cleanup_at(&self, older_than_hours: i64, now: DateTime<Utc>) -> AppResult<u64> {
        if older_than_hours < 0 {
            return Err(AppError::ValidationError(
                "older_than_hours must not be negative".to_string(),
            ));
        }
        let cutoff = Duration::try_hours(older_than_hours)
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                AppError::ValidationError(format!(
                    "older_than_hours is out of range: {older_than_hours}"
                ))
            })?;

        let deleted = codes::Entity::delete_many()
            .filter(codes::Column::CreatedAt.lt(cutoff))
            .exec(&self.pool)
            .await?
            .rows_affected;

        // Quota entries still inside the rate window must survive any sweep.
        let sends_cutoff = now
            .checked_sub_signed(self.policy.rate_window)
            .map_or(cutoff, |window_start| cutoff.min(window_start));
        let pruned = sends::Entity::delete_many()
            .filter(sends::Column::CreatedAt.lt(sends_cutoff))
            .exec(&self.pool)
            .await?
            .rows_affected;

        log::info!("Verification cleanup removed {deleted} codes and {pruned} quota entries");
        Ok(deleted)
    }

    /// Newest first, for the staff listing.
    pub async fn list_recent(
        &self,
        params: &PaginationParams,
    ) -> AppResult<(Vec<VerificationRecord>, u64)> {
        let total = codes::Entity::find().count(&self.pool).await?;
        let records = codes::Entity::find()
            .order_by_desc(codes::Column::CreatedAt)
            .order_by_desc(codes::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(&self.pool)
            .await?;
        Ok((records, total))
    }

    pub fn is_expired(&self, record: &VerificationRecord, now: DateTime<Utc>) -> bool {
        record.is_expired_at(now, self.policy.code_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use chrono::TimeZone;

    const EMAIL: &str = "a@x.com";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    async fn store() -> VerificationCodeStore {
        VerificationCodeStore::new(test_pool().await, VerificationPolicy::default())
    }

    async fn unverified_count(store: &VerificationCodeStore, email: &str) -> u64 {
        codes::Entity::find()
            .filter(codes::Column::Email.eq(email))
            .filter(codes::Column::IsVerified.eq(false))
            .count(&store.pool)
            .await
            .unwrap()
    }

    async fn insert_code(store: &VerificationCodeStore, email: &str, at: DateTime<Utc>) {
        codes::ActiveModel {
            email: Set(email.to_string()),
            code: Set("000000".to_string()),
            created_at: Set(at),
            is_verified: Set(true),
            ..Default::default()
        }
        .insert(&store.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_create_leaves_exactly_one_unverified_code() {
        let store = store().await;

        let first = store.create_verification_at(EMAIL, t0()).await.unwrap();
        assert_eq!(first.code.len(), 6);
        assert!(!first.is_verified);
        assert_eq!(unverified_count(&store, EMAIL).await, 1);

        let second = store
            .create_verification_at(EMAIL, t0() + Duration::seconds(90))
            .await
            .unwrap();
        assert_eq!(unverified_count(&store, EMAIL).await, 1);

        // superseded code no longer works
        if first.code != second.code {
            let err = store
                .check_code_at(EMAIL, &first.code, t0() + Duration::seconds(100))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::InvalidCode));
        }
        store
            .check_code_at(EMAIL, &second.code, t0() + Duration::seconds(100))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_code_succeeds_exactly_once() {
        let store = store().await;
        let record = store.create_verification_at(EMAIL, t0()).await.unwrap();

        let at = t0() + Duration::seconds(299);
        let verified = store.check_code_at(EMAIL, &record.code, at).await.unwrap();
        assert!(verified.is_verified);

        let err = store.check_code_at(EMAIL, &record.code, at).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
        assert!(store.is_email_verified(EMAIL).await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_code_and_other_email_are_invalid() {
        let store = store().await;
        let record = store.create_verification_at(EMAIL, t0()).await.unwrap();
        let wrong = if record.code == "999999" { "000000" } else { "999999" };

        let err = store.check_code_at(EMAIL, wrong, t0()).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));

        let err = store
            .check_code_at("b@x.com", &record.code, t0())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCode));
        assert!(!store.is_email_verified(EMAIL).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_code_is_distinct_from_invalid() {
        let store = store().await;
        let record = store.create_verification_at(EMAIL, t0()).await.unwrap();

        let err = store
            .check_code_at(EMAIL, &record.code, t0() + Duration::seconds(301))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CodeExpired));

        // still unverified, so no longer usable even though it was matched
        assert_eq!(unverified_count(&store, EMAIL).await, 1);
        assert!(!store.is_email_verified(EMAIL).await.unwrap());
    }

    #[tokio::test]
    async fn test_fourth_code_in_an_hour_is_rate_limited() {
        let store = store().await;
        for minutes in [0, 10, 20] {
            store
                .create_verification_at(EMAIL, t0() + Duration::minutes(minutes))
                .await
                .unwrap();
        }

        let err = store
            .create_verification_at(EMAIL, t0() + Duration::minutes(30))
            .await
            .unwrap_err();
        match err {
            AppError::RateLimitExceeded { wait_seconds } => assert_eq!(wait_seconds, 1800),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(unverified_count(&store, EMAIL).await, 1);

        // first code ages out of the window
        store
            .create_verification_at(EMAIL, t0() + Duration::seconds(3601))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_is_per_email() {
        let store = store().await;
        for minutes in [0, 1, 2] {
            store
                .create_verification_at(EMAIL, t0() + Duration::minutes(minutes))
                .await
                .unwrap();
        }
        let at = t0() + Duration::minutes(3);
        assert!(!store.check_rate_limit_at(EMAIL, at).await.unwrap().is_allowed());
        assert!(store.check_rate_limit_at("b@x.com", at).await.unwrap().is_allowed());
        store.create_verification_at("b@x.com", at).await.unwrap();
    }

    #[tokio::test]
    async fn test_resend_cooldown() {
        let store = store().await;
        assert_eq!(store.can_resend_at(EMAIL, t0()).await.unwrap(), Throttle::Allowed);

        store.create_verification_at(EMAIL, t0()).await.unwrap();

        match store.can_resend_at(EMAIL, t0()).await.unwrap() {
            Throttle::Denied { wait_seconds } => assert!(wait_seconds > 0 && wait_seconds <= 60),
            Throttle::Allowed => panic!("resend allowed during cooldown"),
        }
        assert_eq!(
            store
                .can_resend_at(EMAIL, t0() + Duration::milliseconds(30_500))
                .await
                .unwrap(),
            Throttle::Denied { wait_seconds: 30 }
        );
        assert_eq!(
            store
                .can_resend_at(EMAIL, t0() + Duration::seconds(61))
                .await
                .unwrap(),
            Throttle::Allowed
        );
    }

    #[tokio::test]
    async fn test_cooldown_counts_verified_codes() {
        let store = store().await;
        let record = store.create_verification_at(EMAIL, t0()).await.unwrap();
        store
            .check_code_at(EMAIL, &record.code, t0() + Duration::seconds(5))
            .await
            .unwrap();

        let throttle = store
            .can_resend_at(EMAIL, t0() + Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(throttle, Throttle::Denied { wait_seconds: 50 });
    }

    #[tokio::test]
    async fn test_cleanup_uses_strict_cutoff() {
        let store = store().await;
        let now = t0();
        insert_code(&store, "old@x.com", now - Duration::hours(25)).await;
        insert_code(&store, "edge@x.com", now - Duration::hours(24)).await;
        insert_code(&store, "new@x.com", now - Duration::hours(1)).await;

        assert_eq!(store.cleanup_at(24, now).await.unwrap(), 1);
        assert_eq!(codes::Entity::find().count(&store.pool).await.unwrap(), 2);
        assert_eq!(store.cleanup_at(24, now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_quota_inside_window() {
        let store = store().await;
        for minutes in [0, 1, 2] {
            store
                .create_verification_at(EMAIL, t0() + Duration::minutes(minutes))
                .await
                .unwrap();
        }

        // superseded codes are already gone; only the latest remains
        let now = t0() + Duration::minutes(5);
        assert_eq!(store.cleanup_at(0, now).await.unwrap(), 1);
        assert!(!store.check_rate_limit_at(EMAIL, now).await.unwrap().is_allowed());

        assert!(matches!(
            store.cleanup_at(-1, now).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_rejects_unrepresentable_retention() {
        let store = store().await;
        insert_code(&store, "old@x.com", t0() - Duration::hours(25)).await;

        for hours in [i64::MAX, i64::MAX / 3600] {
            assert!(matches!(
                store.cleanup_at(hours, t0()).await,
                Err(AppError::ValidationError(_))
            ));
        }
        assert_eq!(codes::Entity::find().count(&store.pool).await.unwrap(), 1);

        // a huge but representable window just keeps everything
        assert_eq!(store.cleanup_at(24 * 365 * 100, t0()).await.unwrap(), 0);
    }

    #[test]
    fn test_policy_from_config() {
        let config = VerificationConfig::default();
        assert_eq!(
            VerificationPolicy::try_from(&config).unwrap(),
            VerificationPolicy::default()
        );

        for config in [
            VerificationConfig {
                code_ttl_secs: i64::MAX,
                ..Default::default()
            },
            VerificationConfig {
                resend_cooldown_secs: -1,
                ..Default::default()
            },
            VerificationConfig {
                rate_window_secs: MAX_POLICY_SPAN_SECS + 1,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                VerificationPolicy::try_from(&config),
                Err(AppError::ValidationError(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_one_unverified_code() {
        let store = store().await;
        let (a, b) = tokio::join!(
            store.create_verification_at(EMAIL, t0()),
            store.create_verification_at(EMAIL, t0() + Duration::seconds(1)),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(unverified_count(&store, EMAIL).await, 1);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = store().await;
        store.create_verification_at("a@x.com", t0()).await.unwrap();
        store
            .create_verification_at("b@x.com", t0() + Duration::minutes(1))
            .await
            .unwrap();

        let (records, total) = store
            .list_recent(&PaginationParams::new(None, None))
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(records[0].email, "b@x.com");
        assert!(store.is_expired(&records[1], t0() + Duration::minutes(6)));
    }
}
