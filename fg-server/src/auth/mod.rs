use fg::basic_models::{Credentials, PasswordChange, UserRegistration};
use rand::RngCore;
use regex::Regex;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use crate::errors::{FieldErrors, WebError, WebResult};
use crate::models::{sqlite_current_timestamp, User};

pub mod route;
pub mod session;

pub type AuthResult<X> = Result<X, AuthError>;

const HASH_ITERATIONS: u32 = 20_000;
const TOKEN_BYTES: usize = 20;
const MAX_NAME_LEN: usize = 150;
const MAX_EMAIL_LEN: usize = 254;

lazy_static::lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").expect("valid username pattern");
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern");
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,
    #[error("Invalid token header: {0}")]
    MalformedHeader(&'static str),
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Unable to log in with provided credentials.")]
    BadCredentials,
    #[error("Stored password hash is malformed")]
    MalformedHash,
}

impl From<AuthError> for WebError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::BadCredentials => WebError::invalid("non_field_errors", e.to_string()),
            AuthError::MalformedHash => WebError::Internal(e.into()),
            AuthError::MissingCredentials
            | AuthError::MalformedHeader(_)
            | AuthError::InvalidToken => WebError::Unauthorized(e.to_string()),
        }
    }
}

fn iterate_hash(salt: &[u8], password: &str, iterations: u32) -> Vec<u8> {
    let mut digest = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize();
    for _ in 1..iterations {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .chain_update(password.as_bytes())
            .finalize();
    }
    digest.to_vec()
}

/// Hash a password for storage as `sha256$<iterations>$<salt>$<digest>`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = iterate_hash(&salt, password, HASH_ITERATIONS);
    format!(
        "sha256${}${}${}",
        HASH_ITERATIONS,
        hex::encode(salt),
        hex::encode(digest)
    )
}

/// Check a password against a hash produced by `hash_password`.
pub fn verify_password(password: &str, stored: &str) -> AuthResult<bool> {
    let mut parts = stored.split('$');
    let (Some("sha256"), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(AuthError::MalformedHash);
    };
    let iterations: u32 = iterations.parse().map_err(|_| AuthError::MalformedHash)?;
    let salt = hex::decode(salt).map_err(|_| AuthError::MalformedHash)?;
    let expected = hex::decode(expected).map_err(|_| AuthError::MalformedHash)?;
    let actual = iterate_hash(&salt, password, iterations);
    // Compare every byte so timing does not reveal the matching prefix
    Ok(actual.len() == expected.len()
        && actual
            .iter()
            .zip(&expected)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0)
}

fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a new API token for a user. Only its digest is stored.
pub fn issue_token(conn: &Connection, user_id: i64) -> rusqlite::Result<String> {
    let mut key = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut key);
    let token = hex::encode(key);
    conn.execute(
        "INSERT INTO auth_token (token_hash, user_id, created_on) VALUES (?, ?, ?)",
        params![token_digest(&token), user_id, sqlite_current_timestamp()],
    )?;
    Ok(token)
}

pub fn revoke_token(conn: &Connection, token: &str) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM auth_token WHERE token_hash = ?",
        params![token_digest(token)],
    )?;
    Ok(())
}

/// Find the owner of a token, if the token is live.
pub fn user_for_token(conn: &Connection, token: &str) -> rusqlite::Result<Option<User>> {
    crate::database::first_row(
        conn,
        "SELECT user.* FROM auth_token
        JOIN user ON user.user_id = auth_token.user_id
        WHERE auth_token.token_hash = ?",
        params![token_digest(token)],
    )
}

/// Exchange an email and password for a fresh token.
pub fn login(conn: &Connection, credentials: &Credentials) -> WebResult<String> {
    let user = User::get_by_email(conn, credentials.email.trim())?.ok_or(AuthError::BadCredentials)?;
    let stored = User::password_hash(conn, user.id)?;
    if !verify_password(&credentials.password, &stored)? {
        tracing::info!(user_id = user.id, "Rejected login");
        return Err(AuthError::BadCredentials.into());
    }
    Ok(issue_token(conn, user.id)?)
}

fn check_password_strength(errors: &mut FieldErrors, field: &str, password: &str) {
    if password.chars().count() < 8 {
        errors.add(field, "Password must be at least 8 characters.");
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, "Password cannot be entirely numeric.");
    }
}

/// Validate and create a user account.
pub fn register(conn: &Connection, registration: &UserRegistration, is_admin: bool) -> WebResult<User> {
    let mut errors = FieldErrors::default();
    let email = registration.email.trim();
    let username = registration.username.trim();

    if email.is_empty() {
        errors.add("email", "This field is required.");
    } else if email.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(email) {
        errors.add("email", "Enter a valid email address.");
    } else if User::email_taken(conn, email)? {
        errors.add("email", "A user with that email already exists.");
    }

    if username.is_empty() {
        errors.add("username", "This field is required.");
    } else if username.chars().count() > MAX_NAME_LEN || !USERNAME_RE.is_match(username) {
        errors.add(
            "username",
            "Enter a valid username. Letters, digits and @/./+/-/_ only.",
        );
    } else if username.eq_ignore_ascii_case("me") {
        errors.add("username", "This username is reserved.");
    } else if User::username_taken(conn, username)? {
        errors.add("username", "A user with that username already exists.");
    }

    for (field, value) in [
        ("first_name", &registration.first_name),
        ("last_name", &registration.last_name),
    ] {
        if value.trim().is_empty() {
            errors.add(field, "This field is required.");
        } else if value.chars().count() > MAX_NAME_LEN {
            errors.add(field, "Ensure this field has no more than 150 characters.");
        }
    }
    check_password_strength(&mut errors, "password", &registration.password);
    errors.into_result()?;

    let cleaned = UserRegistration {
        email: email.to_string(),
        username: username.to_string(),
        first_name: registration.first_name.trim().to_string(),
        last_name: registration.last_name.trim().to_string(),
        password: String::new(),
    };
    let user_id = User::push(conn, &cleaned, &hash_password(&registration.password), is_admin)
        .map_err(|e| {
            // Lost a race with another registration for the same name or email
            if crate::errors::is_unique_violation(&e) {
                WebError::invalid("email", "A user with that email or username already exists.")
            } else {
                e.into()
            }
        })?;
    tracing::info!(user_id, "Registered user");
    User::get_by_id(conn, user_id)?.ok_or(WebError::NotFound)
}

/// Replace a user's password after checking the current one.
pub fn change_password(conn: &Connection, user: &User, change: &PasswordChange) -> WebResult<()> {
    let stored = User::password_hash(conn, user.id)?;
    let mut errors = FieldErrors::default();
    if !verify_password(&change.current_password, &stored)? {
        errors.add("current_password", "Invalid password.");
    }
    check_password_strength(&mut errors, "new_password", &change.new_password);
    errors.into_result()?;
    User::set_password_hash(conn, user.id, &hash_password(&change.new_password))?;
    Ok(())
}
