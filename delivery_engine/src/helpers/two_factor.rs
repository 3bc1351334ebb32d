use rand::Rng;

/// Generates the 6-digit numeric code attached to a withdrawal request. Generated exactly once per request;
/// resends reuse the stored code.
pub fn generate_two_factor_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}
