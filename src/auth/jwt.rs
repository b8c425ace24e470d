use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime of an access token.
pub const ACCESS_TOKEN_MINUTES: i64 = 60;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    /// Normalized email at issue time.
    pub email: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(account_id: Uuid, email: &str) -> Self {
        Self {
            sub: account_id,
            email: email.to_string(),
            exp: (Utc::now() + Duration::minutes(ACCESS_TOKEN_MINUTES)).timestamp(),
        }
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-jwt-secret-that-is-long-enough";

    #[test]
    fn token_carries_claims() {
        let id = Uuid::new_v4();
        let token = encode_token(&Claims::new(id, "admin@dixai.net"), SECRET).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "admin@dixai.net");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = encode_token(&Claims::new(Uuid::new_v4(), "a@b.co"), SECRET).unwrap();
        assert!(decode_token(&token, "some-other-secret-value").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "a@b.co".to_string(),
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let token = encode_token(&claims, SECRET).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }
}
