//! JWT 令牌签发与校验，以及受保护路由的 Bearer 中间件
//!
//! 会话令牌与邀请令牌共用同一把密钥，通过 `kind` 声明区分。

use application::{IssuedToken, TokenError, TokenKind, TokenService};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration, Utc};
use config::JwtConfig;
use domain::{InviteCode, UserId};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
///
/// 会话令牌的 `sub` 是用户 id，邀请令牌的 `sub` 是邀请码。
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    fn sign(
        &self,
        kind: TokenKind,
        subject: String,
        ttl: Duration,
    ) -> Result<IssuedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let claims = Claims {
            sub: subject,
            kind,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| TokenError::Signing(err.to_string()))?;
        Ok(IssuedToken { token, expires_at })
    }

    /// 校验签名与过期时间，再确认令牌种类
    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err.to_string()),
            })?;

        if claims.kind != expected {
            return Err(TokenError::WrongKind { expected });
        }
        Ok(claims)
    }
}

impl TokenService for JwtService {
    fn issue_session(&self, user_id: UserId) -> Result<IssuedToken, TokenError> {
        self.sign(
            TokenKind::Session,
            user_id.to_string(),
            Duration::hours(self.config.session_ttl_hours),
        )
    }

    fn verify_session(&self, token: &str) -> Result<UserId, TokenError> {
        let claims = self.verify(token, TokenKind::Session)?;
        Uuid::parse_str(&claims.sub)
            .map(UserId::from)
            .map_err(|err| TokenError::Invalid(format!("subject is not a user id: {err}")))
    }

    fn issue_invite(&self, code: &InviteCode) -> Result<IssuedToken, TokenError> {
        self.sign(
            TokenKind::Invite,
            code.to_string(),
            Duration::minutes(self.config.invite_ttl_minutes),
        )
    }

    fn verify_invite(&self, token: &str) -> Result<InviteCode, TokenError> {
        let claims = self.verify(token, TokenKind::Invite)?;
        InviteCode::parse(&claims.sub)
            .map_err(|err| TokenError::Invalid(format!("subject is not an invite code: {err}")))
    }
}

/// 通过认证的请求身份，由 [`require_session`] 写入请求扩展
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity(pub UserId);

/// 从 `Authorization: Bearer <token>` 中取出令牌
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let result = state.auth.authenticate(bearer_token(req.headers()));
    match result {
        Ok(user_id) => {
            req.extensions_mut().insert(Identity(user_id));
            next.run(req).await
        }
        Err(err) => {
            warn!(path = %req.uri().path(), error = %err, "拒绝未认证请求");
            ApiError::from(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "unit-test-secret-that-is-long-enough".to_string(),
            session_ttl_hours: 24,
            invite_ttl_minutes: 15,
        })
    }

    #[test]
    fn session_token_round_trips_to_the_same_user() {
        let jwt = service();
        let user_id = UserId::from(Uuid::new_v4());
        let issued = jwt.issue_session(user_id).unwrap();

        assert_eq!(jwt.verify_session(&issued.token).unwrap(), user_id);
        assert!(issued.expires_at > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn invite_token_carries_the_code() {
        let jwt = service();
        let code = InviteCode::parse("123-456-789-012").unwrap();
        let issued = jwt.issue_invite(&code).unwrap();

        assert_eq!(jwt.verify_invite(&issued.token).unwrap(), code);
        assert!(issued.expires_at <= Utc::now() + Duration::minutes(15));
    }

    #[test]
    fn kinds_are_not_interchangeable() {
        let jwt = service();
        let session = jwt.issue_session(UserId::from(Uuid::new_v4())).unwrap();
        let invite = jwt
            .issue_invite(&InviteCode::parse("123-456-789-012").unwrap())
            .unwrap();

        assert!(matches!(
            jwt.verify_invite(&session.token),
            Err(TokenError::WrongKind {
                expected: TokenKind::Invite
            })
        ));
        assert!(matches!(
            jwt.verify_session(&invite.token),
            Err(TokenError::WrongKind {
                expected: TokenKind::Session
            })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let jwt = service();
        let past = Utc::now() - Duration::minutes(5);
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            kind: TokenKind::Session,
            iat: (past - Duration::hours(1)).timestamp(),
            exp: past.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();

        assert!(matches!(jwt.verify_session(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn foreign_signature_is_invalid() {
        let other = JwtService::new(JwtConfig {
            secret: "another-secret-that-is-also-long-enough".to_string(),
            session_ttl_hours: 24,
            invite_ttl_minutes: 15,
        });
        let token = other
            .issue_session(UserId::from(Uuid::new_v4()))
            .unwrap()
            .token;

        assert!(matches!(
            service().verify_session(&token),
            Err(TokenError::Invalid(_))
        ));
        assert!(matches!(
            service().verify_session("not-a-jwt"),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn bearer_prefix_is_required() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
