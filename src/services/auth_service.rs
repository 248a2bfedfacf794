use crate::entities::{social_account_entity as social_accounts, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::external::SharedEmailSender;
use crate::models::*;
use crate::services::{NewUser, UserService, VerificationCodeStore, create_user};
use crate::utils::*;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};

const INVALID_LOGIN: &str = "The email or password you entered is incorrect.";
const MAX_FULL_NAME_LENGTH: usize = 150;

#[derive(Clone)]
pub struct AuthService {
    user_service: UserService,
    verification_store: VerificationCodeStore,
    jwt_service: JwtService,
    email_sender: SharedEmailSender,
}

impl AuthService {
    pub fn new(
        user_service: UserService,
        verification_store: VerificationCodeStore,
        jwt_service: JwtService,
        email_sender: SharedEmailSender,
    ) -> Self {
        Self {
            user_service,
            verification_store,
            jwt_service,
            email_sender,
        }
    }

    /// Recover the flow state from a signup token. A missing, expired or
    /// tampered token yields an empty flow, which the steps reject with
    /// `SessionExpired`.
    pub fn signup_flow(&self, signup_token: Option<&str>) -> SignupFlow {
        signup_token
            .and_then(|token| self.jwt_service.verify_signup_token(token).ok())
            .map(SignupFlow::for_email)
            .unwrap_or_default()
    }

    /// Step 1: issue a code for a new address and email it.
    pub async fn start_signup(&self, request: StartSignupRequest) -> AppResult<SignupStepResponse> {
        let email = normalize_email(&request.email)?;

        if self.user_service.find_by_email(&email).await?.is_some() {
            return Err(AppError::ValidationError(
                "An account with this email already exists.".to_string(),
            ));
        }

        self.issue_and_send(&email).await
    }

    /// Step 2: consume the emailed code.
    pub async fn verify_signup(&self, flow: &SignupFlow, code: &str) -> AppResult<()> {
        let email = flow.require_email()?;

        let code = code.trim();
        if !is_well_formed_code(code) {
            return Err(AppError::ValidationError(
                "Enter the 6-digit code from your email.".to_string(),
            ));
        }

        self.verification_store.check_code(email, code).await?;
        Ok(())
    }

    /// Cooldown first, then the hourly quota inside `create_verification`.
    pub async fn resend_code(&self, flow: &SignupFlow) -> AppResult<SignupStepResponse> {
        let email = flow.require_email()?;

        if let Throttle::Denied { wait_seconds } = self.verification_store.can_resend(email).await? {
            return Err(AppError::ResendCooldown { wait_seconds });
        }

        self.issue_and_send(email).await
    }

    /// Step 3: create the account for a verified address.
    pub async fn complete_signup(
        &self,
        flow: &SignupFlow,
        request: CompleteSignupRequest,
    ) -> AppResult<AuthResponse> {
        let email = flow.require_email()?;

        if !self.verification_store.is_email_verified(email).await? {
            return Err(AppError::EmailNotVerified);
        }

        let full_name = request.full_name.trim();
        if full_name.is_empty() {
            return Err(AppError::ValidationError(
                "Full name is required.".to_string(),
            ));
        }
        if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
            return Err(AppError::ValidationError(format!(
                "Full name must be at most {MAX_FULL_NAME_LENGTH} characters."
            )));
        }

        validate_password_confirmation(&request.password1, &request.password2)?;
        validate_password(&request.password1, email, Some(full_name))?;
        let password_hash = hash_password(&request.password1)?;

        let txn = self.user_service.pool().begin().await?;
        let taken = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&txn)
            .await?;
        if taken.is_some() {
            return Err(AppError::ValidationError(
                "An account with this email already exists.".to_string(),
            ));
        }
        let user = create_user(
            &txn,
            NewUser {
                email: email.to_string(),
                full_name: Some(full_name.to_string()),
                password_hash: Some(password_hash),
                ..Default::default()
            },
        )
        .await?;
        txn.commit().await?;

        log::info!("Account created for {} ({})", user.email, user.username);
        let user = self.user_service.record_login(user, Utc::now()).await?;
        self.issue_tokens(user)
    }

    pub async fn signin(&self, request: SignInRequest) -> AppResult<AuthResponse> {
        let invalid = || AppError::AuthError(INVALID_LOGIN.to_string());

        let email = normalize_email(&request.email).map_err(|_| invalid())?;
        let user = self
            .user_service
            .find_by_email(&email)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(invalid)?;

        let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
        if !verify_password(&request.password, hash)? {
            return Err(invalid());
        }

        let user = self.user_service.record_login(user, Utc::now()).await?;
        self.issue_tokens(user)
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(refresh_token)?;
        let user_id: i32 = claims
            .sub
            .parse()
            .map_err(|_| AppError::AuthError("Invalid token".to_string()))?;

        let user = self.user_service.get_user_by_id(user_id).await?;
        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }

        let access_token = self.jwt_service.generate_access_token(user.id)?;
        Ok(AuthResponse {
            user: user.into(),
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    /// Sign in with a profile the OAuth provider has already authenticated.
    pub async fn social_login(&self, profile: SocialProfile) -> AppResult<AuthResponse> {
        if profile.provider.trim().is_empty() || profile.uid.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Provider and uid are required".to_string(),
            ));
        }

        // 1. already linked
        let linked = social_accounts::Entity::find()
            .filter(social_accounts::Column::Provider.eq(profile.provider.as_str()))
            .filter(social_accounts::Column::Uid.eq(profile.uid.as_str()))
            .find_also_related(users::Entity)
            .one(self.user_service.pool())
            .await?;
        if let Some((_, Some(user))) = linked {
            return self.finish_social_login(user).await;
        }

        let email = profile
            .email
            .as_deref()
            .ok_or_else(|| {
                AppError::ValidationError("Email is required for social sign-in.".to_string())
            })
            .and_then(normalize_email)?;
        let extra_data = serde_json::to_string(&profile)?;

        let txn = self.user_service.pool().begin().await?;

        // 2. link to the account with the same email, 3. or create one
        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(email.as_str()))
            .one(&txn)
            .await?;
        let user = match existing {
            Some(user) => user,
            None => {
                let user = create_user(
                    &txn,
                    NewUser {
                        email: email.clone(),
                        full_name: profile.full_name(),
                        password_hash: None,
                        ..Default::default()
                    },
                )
                .await?;
                log::info!("Created {} via {} sign-in", user.email, profile.provider);
                user
            }
        };

        social_accounts::ActiveModel {
            user_id: Set(user.id),
            provider: Set(profile.provider.clone()),
            uid: Set(profile.uid.clone()),
            extra_data: Set(Some(extra_data)),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        log::info!("Linked {} account to user {}", profile.provider, user.id);
        self.finish_social_login(user).await
    }

    async fn finish_social_login(&self, user: users::Model) -> AppResult<AuthResponse> {
        if !user.is_active {
            return Err(AppError::AuthError("Account is disabled".to_string()));
        }
        let user = self.user_service.record_login(user, Utc::now()).await?;
        self.issue_tokens(user)
    }

    async fn issue_and_send(&self, email: &str) -> AppResult<SignupStepResponse> {
        let record = self.verification_store.create_verification(email).await?;

        // On a failed send the stored code stays valid but no signup token is
        // returned. A first-step caller has nothing to resend with and must
        // start signup again.
        if let Err(e) = self
            .email_sender
            .send_verification_code(email, &record.code)
            .await
        {
            log::warn!("Failed to send verification code to {email}: {e}");
            return Err(e);
        }

        Ok(SignupStepResponse {
            email: email.to_string(),
            signup_token: self.jwt_service.generate_signup_token(email)?,
            expires_in: self.verification_store.policy().code_ttl.num_seconds(),
        })
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id)?;

        Ok(AuthResponse {
            user: user.into(),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::entities::email_verification_entity as codes;
    use crate::external::testing::RecordingEmailSender;
    use crate::services::VerificationPolicy;
    use sea_orm::PaginatorTrait;
    use std::sync::Arc;

    const EMAIL: &str = "amina@example.com";
    const PASSWORD: &str = "Tilawah-2024";

    struct Harness {
        auth: AuthService,
        store: VerificationCodeStore,
        mailer: Arc<RecordingEmailSender>,
    }

    async fn harness() -> Harness {
        let pool = test_pool().await;
        let store = VerificationCodeStore::new(pool.clone(), VerificationPolicy::default());
        let mailer = Arc::new(RecordingEmailSender::default());
        let auth = AuthService::new(
            UserService::new(pool),
            store.clone(),
            JwtService::new("test-secret", 3600, 7200, 1800),
            mailer.clone(),
        );
        Harness {
            auth,
            store,
            mailer,
        }
    }

    fn complete_request(token: &str) -> CompleteSignupRequest {
        CompleteSignupRequest {
            signup_token: Some(token.to_string()),
            full_name: "Amina Yusuf".to_string(),
            password1: PASSWORD.to_string(),
            password2: PASSWORD.to_string(),
        }
    }

    async fn start(h: &Harness) -> SignupStepResponse {
        h.auth
            .start_signup(StartSignupRequest {
                email: "  Amina@Example.com ".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_signup_then_signin() {
        let h = harness().await;

        let step = start(&h).await;
        assert_eq!(step.email, EMAIL);
        assert_eq!(step.expires_in, 300);

        let flow = h.auth.signup_flow(Some(&step.signup_token));
        let code = h.mailer.last_code_for(EMAIL).unwrap();
        h.auth.verify_signup(&flow, &code).await.unwrap();

        let auth = h
            .auth
            .complete_signup(&flow, complete_request(&step.signup_token))
            .await
            .unwrap();
        assert_eq!(auth.user.email, EMAIL);
        assert_eq!(auth.user.username, "amina");
        assert_eq!(auth.user.second_name_display, "Yusuf");
        assert!(auth.user.has_password);

        let signed_in = h
            .auth
            .signin(SignInRequest {
                email: "AMINA@example.com".to_string(),
                password: PASSWORD.to_string(),
            })
            .await
            .unwrap();
        assert_eq!(signed_in.user.id, auth.user.id);
        assert!(signed_in.user.last_login.is_some());

        let refreshed = h.auth.refresh_token(&signed_in.refresh_token).await.unwrap();
        assert_eq!(refreshed.user.id, auth.user.id);
    }

    #[tokio::test]
    async fn test_steps_without_session_expire() {
        let h = harness().await;
        let flow = h.auth.signup_flow(None);

        assert!(matches!(
            h.auth.verify_signup(&flow, "123456").await,
            Err(AppError::SessionExpired)
        ));
        assert!(matches!(
            h.auth.resend_code(&flow).await,
            Err(AppError::SessionExpired)
        ));

        let tampered = h.auth.signup_flow(Some("not-a-token"));
        assert!(matches!(
            h.auth.complete_signup(&tampered, complete_request("x")).await,
            Err(AppError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_complete_requires_verified_email() {
        let h = harness().await;
        let step = start(&h).await;
        let flow = h.auth.signup_flow(Some(&step.signup_token));

        assert!(matches!(
            h.auth
                .complete_signup(&flow, complete_request(&step.signup_token))
                .await,
            Err(AppError::EmailNotVerified)
        ));
    }

    #[tokio::test]
    async fn test_malformed_and_wrong_codes() {
        let h = harness().await;
        let step = start(&h).await;
        let flow = h.auth.signup_flow(Some(&step.signup_token));

        assert!(matches!(
            h.auth.verify_signup(&flow, "12ab56").await,
            Err(AppError::ValidationError(_))
        ));

        let code = h.mailer.last_code_for(EMAIL).unwrap();
        let wrong = if code == "111111" { "222222" } else { "111111" };
        assert!(matches!(
            h.auth.verify_signup(&flow, wrong).await,
            Err(AppError::InvalidCode)
        ));

        h.auth.verify_signup(&flow, &code).await.unwrap();
        assert!(matches!(
            h.auth.verify_signup(&flow, &code).await,
            Err(AppError::InvalidCode)
        ));
    }

    #[tokio::test]
    async fn test_resend_inside_cooldown_is_refused() {
        let h = harness().await;
        let step = start(&h).await;
        let flow = h.auth.signup_flow(Some(&step.signup_token));

        match h.auth.resend_code(&flow).await {
            Err(AppError::ResendCooldown { wait_seconds }) => {
                assert!(wait_seconds > 0 && wait_seconds <= 60)
            }
            other => panic!("expected cooldown, got {other:?}"),
        }
        assert_eq!(h.mailer.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_code_valid() {
        let h = harness().await;
        h.mailer.set_failing(true);

        let err = h
            .auth
            .start_signup(StartSignupRequest {
                email: EMAIL.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailDeliveryError(_)));

        let record = codes::Entity::find()
            .filter(codes::Column::Email.eq(EMAIL))
            .one(h.auth.user_service.pool())
            .await
            .unwrap()
            .expect("code was stored");
        h.store.check_code(EMAIL, &record.code).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_delivery_is_recovered_by_restarting_signup() {
        let h = harness().await;
        h.mailer.set_failing(true);
        let request = StartSignupRequest {
            email: EMAIL.to_string(),
        };
        assert!(matches!(
            h.auth.start_signup(request.clone()).await,
            Err(AppError::EmailDeliveryError(_))
        ));

        // nothing to present at resend without a token
        let flow = h.auth.signup_flow(None);
        assert!(matches!(
            h.auth.resend_code(&flow).await,
            Err(AppError::SessionExpired)
        ));

        h.mailer.set_failing(false);
        let step = h.auth.start_signup(request).await.unwrap();
        let flow = h.auth.signup_flow(Some(&step.signup_token));
        let code = h.mailer.last_code_for(EMAIL).unwrap();
        h.auth.verify_signup(&flow, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_account_cannot_restart_signup() {
        let h = harness().await;
        create_user(
            h.auth.user_service.pool(),
            NewUser {
                email: EMAIL.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = h
            .auth
            .start_signup(StartSignupRequest {
                email: EMAIL.to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(h.mailer.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_bad_passwords() {
        let h = harness().await;
        let step = start(&h).await;
        let flow = h.auth.signup_flow(Some(&step.signup_token));
        let code = h.mailer.last_code_for(EMAIL).unwrap();
        h.auth.verify_signup(&flow, &code).await.unwrap();

        let mut mismatch = complete_request(&step.signup_token);
        mismatch.password2 = "Something-else-1".to_string();
        assert!(matches!(
            h.auth.complete_signup(&flow, mismatch).await,
            Err(AppError::ValidationError(_))
        ));

        let mut numeric = complete_request(&step.signup_token);
        numeric.password1 = "82736451".to_string();
        numeric.password2 = "82736451".to_string();
        assert!(matches!(
            h.auth.complete_signup(&flow, numeric).await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_signin_failures_share_one_message() {
        let h = harness().await;
        create_user(
            h.auth.user_service.pool(),
            NewUser {
                email: "social@example.com".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        for (email, password) in [
            ("nobody@example.com", PASSWORD),
            ("social@example.com", PASSWORD),
            ("not-an-email", PASSWORD),
        ] {
            let err = h
                .auth
                .signin(SignInRequest {
                    email: email.to_string(),
                    password: password.to_string(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.user_message(), INVALID_LOGIN);
        }
    }

    #[tokio::test]
    async fn test_social_login_creates_links_and_reuses() {
        let h = harness().await;
        let profile = SocialProfile {
            provider: "google".to_string(),
            uid: "g-1".to_string(),
            email: Some("Bilal@Example.com".to_string()),
            given_name: Some("Bilal".to_string()),
            family_name: Some("Rabah".to_string()),
            ..Default::default()
        };

        let created = h.auth.social_login(profile.clone()).await.unwrap();
        assert_eq!(created.user.email, "bilal@example.com");
        assert_eq!(created.user.full_name.as_deref(), Some("Bilal Rabah"));
        assert!(!created.user.has_password);

        let again = h.auth.social_login(profile).await.unwrap();
        assert_eq!(again.user.id, created.user.id);

        // second provider, same email: linked to the same account
        let github = SocialProfile {
            provider: "github".to_string(),
            uid: "gh-9".to_string(),
            email: Some("bilal@example.com".to_string()),
            ..Default::default()
        };
        let linked = h.auth.social_login(github).await.unwrap();
        assert_eq!(linked.user.id, created.user.id);

        let links = social_accounts::Entity::find()
            .count(h.auth.user_service.pool())
            .await
            .unwrap();
        assert_eq!(links, 2);
    }

    #[tokio::test]
    async fn test_social_login_requires_email() {
        let h = harness().await;
        let profile = SocialProfile {
            provider: "google".to_string(),
            uid: "g-2".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            h.auth.social_login(profile).await,
            Err(AppError::ValidationError(_))
        ));
    }
}
