use rand::Rng;

pub const VERIFICATION_CODE_LEN: usize = 6;

/// 6-digit numeric code, each digit drawn independently so leading zeros occur.
pub fn generate_six_digit_code() -> String {
    let mut rng = rand::thread_rng();
    (0..VERIFICATION_CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Shape check for user-submitted codes.
pub fn is_well_formed_code(code: &str) -> bool {
    code.len() == VERIFICATION_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}
