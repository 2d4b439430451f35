use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::AppError;

const DEFAULT_EXP_HOURS: i64 = 24;
const DEFAULT_REFRESH_MINUTES: i64 = 10;

/// Signing settings for session tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    /// Sessions expiring within this window are re-issued.
    pub refresh_minutes: i64,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours: DEFAULT_EXP_HOURS,
            refresh_minutes: DEFAULT_REFRESH_MINUTES,
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = env_i64("JWT_EXP_HOURS", DEFAULT_EXP_HOURS)?;
        let refresh_minutes = env_i64("SESSION_REFRESH_MINUTES", DEFAULT_REFRESH_MINUTES)?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
            refresh_minutes,
        })
    }

    pub fn refresh_window(&self) -> Duration {
        Duration::minutes(self.refresh_minutes)
    }

    pub fn encode(&self, user_id: Uuid, role_claim: Option<&str>) -> Result<String, AppError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            role: role_claim.map(str::to_string),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        self.encode_claims(&claims)
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64, AppError> {
    match std::env::var(key) {
        Ok(val) => val
            .parse::<i64>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid integer"))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    /// Embedded role claim copied from the user's metadata, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        timestamp(self.exp)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        timestamp(self.iat)
    }
}

fn timestamp(secs: usize) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs as i64, 0).unwrap_or_default()
}
