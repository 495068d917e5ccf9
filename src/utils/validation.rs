use validator::ValidateEmail;

pub fn is_valid_email(raw: &str) -> bool {
    raw.trim().to_string().validate_email()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}
