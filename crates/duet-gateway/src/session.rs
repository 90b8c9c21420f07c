use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use duet_types::Portal;
use duet_types::api::Claims;

/// Session tokens stay valid this long.
const SESSION_DAYS: i64 = 30;

/// Sign a session token for a portal.
pub fn issue_token(secret: &str, portal: Portal) -> anyhow::Result<String> {
    let claims = Claims {
        sub: portal,
        exp: (chrono::Utc::now() + chrono::Duration::days(SESSION_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Validate a session token, returning its claims if signature and expiry check out.
pub fn verify_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_verifies_with_same_secret_only() {
        let token = issue_token("s3cret", Portal::Girlfriend).unwrap();
        let claims = verify_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, Portal::Girlfriend);
        assert!(verify_token("other", &token).is_none());
        assert!(verify_token("s3cret", "not-a-jwt").is_none());
    }
}
