// Session and credential primitives
// Passwords are stored as salted Argon2id PHC strings; sessions are HS256 JWTs in an HTTP-only cookie

use std::time::{SystemTime, UNIX_EPOCH};

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm as Argon2Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;
use crate::core::EntityId;
use crate::error::{AppError, AppResult};

pub const SESSION_COOKIE: &str = "jwt";

/// JWT claims carried by the session cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub iat: u64,
    pub exp: u64,
}

/// Hashes and verifies passwords with a fixed Argon2id cost.
pub struct PasswordService {
    argon2: Argon2<'static>,
    /// Hash checked when the username is unknown, so both login failures cost the same
    decoy_hash: String,
}

impl PasswordService {
    pub fn new(config: &AuthConfig) -> AppResult<Self> {
        let params = Params::new(
            config.password_hash_memory_kib,
            config.password_hash_iterations,
            1,
            None,
        )
        .map_err(|e| AppError::ConfigurationError(format!("Invalid password hash parameters: {}", e)))?;
        let argon2 = Argon2::new(Argon2Algorithm::Argon2id, Version::V0x13, params);

        let mut service = Self {
            argon2,
            decoy_hash: String::new(),
        };
        service.decoy_hash = service.hash("decoy-password-never-matches")?;
        Ok(service)
    }

    pub fn hash(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    pub fn verify(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Spend the same work as a real verification and report a mismatch.
    pub fn verify_decoy(&self, password: &str) -> AppResult<bool> {
        self.verify(password, &self.decoy_hash)?;
        Ok(false)
    }
}

/// Issues and validates session tokens and builds the cookies carrying them.
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
    secure_cookies: bool,
}

impl SessionIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl_secs: config.session_ttl_days.max(0) as u64 * 24 * 3600,
            secure_cookies: config.secure_cookies,
        }
    }

    pub fn issue(&self, user_id: EntityId) -> AppResult<String> {
        let now = unix_now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Checks signature and expiry and returns the embedded user id.
    pub fn verify(&self, token: &str) -> AppResult<EntityId> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            warn!("Rejected session token: {}", e);
            AppError::Unauthorized("Unauthorized: Invalid token".to_string())
        })?;

        token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Unauthorized: Invalid token".to_string()))
    }

    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .max_age(time::Duration::seconds(self.ttl_secs as i64))
            .build()
    }

    pub fn expired_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure_cookies)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_auth_config() -> AuthConfig {
        let mut config = Config::default().auth;
        config.password_hash_memory_kib = 1024;
        config.password_hash_iterations = 1;
        config
    }

    #[test]
    fn test_password_hash_is_salted() {
        let passwords = PasswordService::new(&test_auth_config()).unwrap();
        let first = passwords.hash("hunter22").unwrap();
        let second = passwords.hash("hunter22").unwrap();

        assert_ne!(first, "hunter22");
        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(passwords.verify("hunter22", &first).unwrap());
        assert!(!passwords.verify("hunter23", &first).unwrap());
        assert!(!passwords.verify_decoy("hunter22").unwrap());
    }

    #[test]
    fn test_token_round_trip() {
        let sessions = SessionIssuer::new(&test_auth_config());
        let token = sessions.issue(EntityId(42)).unwrap();
        assert_eq!(sessions.verify(&token).unwrap(), EntityId(42));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let mut other = test_auth_config();
        other.jwt_secret = "another-secret".to_string();
        let token = SessionIssuer::new(&other).issue(EntityId(42)).unwrap();

        let sessions = SessionIssuer::new(&test_auth_config());
        assert!(matches!(sessions.verify(&token), Err(AppError::Unauthorized(_))));
        assert!(matches!(sessions.verify("garbage"), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = test_auth_config();
        let claims = Claims {
            sub: "42".to_string(),
            iat: unix_now() - 7200,
            exp: unix_now() - 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();

        let sessions = SessionIssuer::new(&config);
        assert!(matches!(sessions.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn test_cookie_attributes() {
        let mut config = test_auth_config();
        config.secure_cookies = true;
        let sessions = SessionIssuer::new(&config);

        let cookie = sessions.session_cookie("token".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));

        let expired = sessions.expired_cookie();
        assert_eq!(expired.value(), "");
        assert_eq!(expired.max_age(), Some(time::Duration::ZERO));
    }
}
