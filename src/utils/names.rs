// names.rs
//
// Random names for everything the sample creates, so that two runs (or a run
// and the leftovers of an aborted one) never collide.

use rand::distributions::{Alphanumeric, Distribution, Uniform};
use rand::Rng;

const DIGITS: &str = "0123456789";
const LOWER_ALNUM: &str = "abcdefghijklmnopqrstuvwxyz0123456789";
const PASSWORD_PREFIX: &str = "Pa5$";
const PASSWORD_RANDOM_LEN: usize = 12;

fn pick_random(max: usize) -> usize {
    assert!(max > 0);

    let mut rng = rand::thread_rng();
    let rnd = Uniform::from(0..max);
    rnd.sample(&mut rng)
}

fn random_from(alphabet: &str, len: usize) -> String {
    let chars: Vec<char> = alphabet.chars().collect();
    (0..len).map(|_| chars[pick_random(chars.len())]).collect()
}

/// `prefix` followed by random lowercase letters and digits, `max_len` characters in total.
/// Azure resource names are case-insensitive, hence lowercase only.
/// If the prefix alone is too long it is cut down to leave room for 3 random characters.
pub fn random_resource_name(prefix: &str, max_len: usize) -> String {
    assert!(max_len > 3, "resource names need room for a random suffix");

    let kept: String = prefix.chars().take(max_len - 3).collect();
    let suffix_len = max_len - kept.chars().count();
    format!("{}{}", kept, random_from(LOWER_ALNUM, suffix_len))
}

/// Short random name (prefix + 6 digits), used for VM and disk names.
/// Windows computer names cannot exceed 15 characters.
pub fn create_random_name(prefix: &str) -> String {
    format!("{}{}", prefix, random_from(DIGITS, 6))
}

/// Admin user name, avoiding the names Azure reserves (admin, administrator, ...)
pub fn create_username() -> String {
    format!("vmadmin{}", random_from(DIGITS, 4))
}

/// Admin password satisfying the Azure complexity rules (upper, lower, digit, special)
pub fn create_password() -> String {
    let rnd: String = rand::thread_rng().sample_iter(&Alphanumeric).take(PASSWORD_RANDOM_LEN).collect();
    format!("{}{}", PASSWORD_PREFIX, rnd)
}
