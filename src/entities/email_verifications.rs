use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;

/// One issued verification code. Several historical rows may exist per email,
/// but at most one of them is unverified.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "email_verifications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Expired once `now` is strictly past `created_at + ttl`, verified or not.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now > self.created_at + ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_expiry_is_strictly_after_ttl() {
        let created_at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let record = Model {
            id: 1,
            email: "a@x.com".to_string(),
            code: "012345".to_string(),
            created_at,
            is_verified: true,
        };
        let ttl = Duration::minutes(5);

        assert!(!record.is_expired_at(created_at + Duration::seconds(299), ttl));
        assert!(!record.is_expired_at(created_at + ttl, ttl));
        assert!(record.is_expired_at(created_at + Duration::seconds(301), ttl));
    }
}
