use rand::{distributions::Alphanumeric, thread_rng, Rng};

const ACCESS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub fn generate_opaque_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Employee access codes avoid look-alike characters (0/O, 1/I).
pub fn generate_access_code(length: usize) -> String {
    let mut rng = thread_rng();
    (0..length)
        .map(|_| ACCESS_CODE_ALPHABET[rng.gen_range(0..ACCESS_CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn normalize_access_code(raw: &str) -> String {
    raw.trim().replace(['-', ' '], "").to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_codes_use_unambiguous_alphabet() {
        let code = generate_access_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.bytes().all(|b| ACCESS_CODE_ALPHABET.contains(&b)));
    }

    #[test]
    fn normalizes_user_typed_codes() {
        assert_eq!(normalize_access_code(" abcd-ef23 "), "ABCDEF23");
    }
}
