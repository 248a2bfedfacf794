pub mod code_generator;
pub mod email;
pub mod jwt;
pub mod password;

pub use code_generator::{generate_six_digit_code, is_well_formed_code};
pub use email::*;
pub use jwt::*;
pub use password::*;
