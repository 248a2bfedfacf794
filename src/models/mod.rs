pub mod common;
pub mod feedback;
pub mod pagination;
pub mod user;
pub mod verification;

pub use common::*;
pub use feedback::*;
pub use pagination::*;
pub use user::*;
pub use verification::*;
