//! Background scheduled tasks for the application.
//!
//! Call `spawn_all` once during startup to launch them.

use crate::config::VerificationConfig;
use crate::services::VerificationCodeStore;
use std::time::Duration;

/// Spawn all background tasks. Detaches via `tokio::spawn`; does not block.
pub fn spawn_all(verification_store: VerificationCodeStore, policy: &VerificationConfig) {
    spawn_verification_cleanup(
        verification_store,
        policy.retention_hours,
        Duration::from_secs(policy.cleanup_interval_secs.max(1)),
    );
}

/// Drop verification codes older than `retention_hours`, every `interval`.
pub fn spawn_verification_cleanup(
    store: VerificationCodeStore,
    retention_hours: i64,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match store.cleanup(retention_hours).await {
                Ok(n) if n > 0 => log::info!("Expired verification codes removed: {n}"),
                Ok(_) => {}
                Err(e) => log::error!("Failed to clean up verification codes: {e:?}"),
            }
            tokio::time::sleep(interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::entities::email_verification_entity as codes;
    use crate::services::VerificationPolicy;
    use chrono::Utc;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};

    #[tokio::test]
    async fn test_cleanup_task_sweeps_on_start() {
        let pool = test_pool().await;
        codes::ActiveModel {
            email: Set("old@x.com".to_string()),
            code: Set("123456".to_string()),
            created_at: Set(Utc::now() - chrono::Duration::hours(30)),
            is_verified: Set(false),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();

        let store = VerificationCodeStore::new(pool.clone(), VerificationPolicy::default());
        let handle = spawn_verification_cleanup(store, 24, Duration::from_secs(3600));

        let mut remaining = 1;
        for _ in 0..50 {
            remaining = codes::Entity::find().count(&pool).await.unwrap();
            if remaining == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();
        assert_eq!(remaining, 0);
    }
}
