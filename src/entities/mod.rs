pub mod contact_messages;
pub mod email_verification_sends;
pub mod email_verifications;
pub mod feedback;
pub mod social_accounts;
pub mod users;

pub use contact_messages as contact_message_entity;
pub use email_verification_sends as email_verification_send_entity;
pub use email_verifications as email_verification_entity;
pub use feedback as feedback_entity;
pub use feedback::FeedbackType;
pub use social_accounts as social_account_entity;
pub use users as user_entity;

/// A single issued email verification code.
pub type VerificationRecord = email_verifications::Model;
