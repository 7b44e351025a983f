use pbkdf2::pbkdf2_hmac;
use serde::Serialize;
use sha2::Sha256;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Parent,
    Student,
}

impl Role {
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "teacher" => Some(Role::Teacher),
            "parent" => Some(Role::Parent),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Student => "student",
        }
    }
}

/// Signed-in user, kept in process state until sign-out.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub const PBKDF2_ITERATIONS: u32 = 200_000;
const HASH_SCHEME: &str = "pbkdf2-sha256";

fn derive_key(password: &str, salt: &str, iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Stored as `pbkdf2-sha256$<iterations>$<hex key>`.
pub fn hash_password(salt: &str, password: &str) -> String {
    hash_password_with(salt, password, PBKDF2_ITERATIONS)
}

fn hash_password_with(salt: &str, password: &str, iterations: u32) -> String {
    format!(
        "{}${}${}",
        HASH_SCHEME,
        iterations,
        to_hex(&derive_key(password, salt, iterations))
    )
}

pub fn verify_password(salt: &str, password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(scheme), Some(iterations), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    if scheme != HASH_SCHEME {
        return false;
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return false;
    };
    if iterations == 0 {
        return false;
    }
    let actual = to_hex(&derive_key(password, salt, iterations));
    // Constant time over the whole digest.
    actual.len() == expected.len()
        && actual
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

pub const MIN_PASSWORD_CHARS: usize = 6;

pub fn password_problem(password: &str) -> Option<String> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        Some(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_CHARS
        ))
    } else {
        None
    }
}
