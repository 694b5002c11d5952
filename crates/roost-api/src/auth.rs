//! Sign-up and sign-in: credential verification, token issuance, and the
//! session bundle a reconnecting client needs.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;

use roost_types::api::{Claims, SessionResponse, TokenResponse};

use crate::{AppState, status_for};

/// Every account starts on the first avatar; clients change it later.
const DEFAULT_AVATAR: i64 = 1;

fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::BAD_REQUEST)?;
    let decoded = B64.decode(encoded).map_err(|_| StatusCode::BAD_REQUEST)?;
    let decoded = String::from_utf8(decoded).map_err(|_| StatusCode::BAD_REQUEST)?;

    let (username, password) = decoded.split_once(':').ok_or(StatusCode::BAD_REQUEST)?;
    if username.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok((username.to_string(), password.to_string()))
}

pub async fn sign_up(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let (username, password) = basic_credentials(&headers)?;

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .to_string();

    state
        .store
        .create_user(&username, DEFAULT_AVATAR, &password_hash)
        .await
        .map_err(status_for)?;

    let token = create_token(&state.jwt_secret, &username, DEFAULT_AVATAR)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

/// Authenticate and hand back the session bundle: the undelivered backlog,
/// pending requests, the friend list and a fresh token. Friends that are
/// online get an `Online Alert`; the drained backlog is acknowledged once it
/// is part of the response.
pub async fn sign_in(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, StatusCode> {
    let (username, password) = basic_credentials(&headers)?;

    let user = state
        .store
        .get_user(&username)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&user.hash).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let backlog = state
        .store
        .drain_pending(&username)
        .await
        .map_err(status_for)?;
    let requests = state
        .store
        .list_pending_requests(&username)
        .await
        .map_err(status_for)?;
    let friends = state.store.list_friends(&username).await.map_err(status_for)?;

    let token = create_token(&state.jwt_secret, &user.username, user.avatar)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // The backlog is in the response; acknowledging it is this layer's job,
    // not the store's. Only the rows handed out here are marked delivered;
    // anything appended since the drain stays queued. Failure here only
    // means the client sees the backlog again next time.
    if let Some(through) = backlog.iter().map(|q| q.id).max() {
        if let Err(e) = state.store.acknowledge_pending(&username, through).await {
            warn!("backlog acknowledge failed for {username}: {e}");
        }
    }

    state.fanout.presence_changed(&username, true).await;

    let messages = backlog.into_iter().map(|q| q.message).collect();
    Ok(Json(SessionResponse {
        messages,
        requests,
        friends,
        token,
    }))
}

fn create_token(secret: &str, username: &str, avatar: i64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        avatar,
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as B64;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    use roost_types::api::Claims;

    use super::{basic_credentials, create_token};

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn basic_credentials_round_trip() {
        let encoded = B64.encode("ada:s3cret");
        let headers = headers_with(&format!("Basic {encoded}"));
        assert_eq!(
            basic_credentials(&headers).unwrap(),
            ("ada".to_string(), "s3cret".to_string())
        );
    }

    #[test]
    fn password_may_contain_colons() {
        let encoded = B64.encode("ada:pa:ss");
        let headers = headers_with(&format!("Basic {encoded}"));
        assert_eq!(basic_credentials(&headers).unwrap().1, "pa:ss");
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(basic_credentials(&HeaderMap::new()).is_err());
        assert!(basic_credentials(&headers_with("Bearer nope")).is_err());

        let encoded = B64.encode("no-separator");
        assert!(basic_credentials(&headers_with(&format!("Basic {encoded}"))).is_err());
    }

    #[test]
    fn token_carries_identity_and_avatar() {
        let token = create_token("secret", "ada", 3).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "ada");
        assert_eq!(data.claims.avatar, 3);
    }
}
