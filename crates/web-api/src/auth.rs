//! JWT 认证模块
//!
//! 提供 token 生成、验证，以及把请求头解析为论坛身份的提取器。

use application::dto::UserDto;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use config::JwtConfig;
use domain::Actor;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, state::AppState};

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Uuid,
    pub exp: i64, // 过期时间 (Unix timestamp)
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

    /// 生成 JWT token
    pub fn generate_token(&self, user_id: Uuid) -> Result<String, ApiError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            user_id,
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|err| {
            tracing::error!(error = %err, "token generation failed");
            ApiError::internal_server_error("token generation failed")
        })
    }

    /// 验证并解析 JWT token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("Invalid token: {}", err)))
    }

    /// 无 Authorization 头时视为匿名；头存在但格式或 token 无效时返回 401。
    pub fn extract_user_from_headers(&self, headers: &HeaderMap) -> Result<Option<Uuid>, ApiError> {
        let Some(value) = headers.get(AUTHORIZATION) else {
            return Ok(None);
        };

        let token = value
            .to_str()
            .ok()
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;

        let claims = self.verify_token(token.trim())?;
        Ok(Some(claims.user_id))
    }
}

/// 当前请求的身份；匿名时为 `None`。
///
/// 每次请求都重新加载用户，角色变化（包括封禁）立即生效。
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Option<Actor>);

impl CurrentActor {
    pub fn as_actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

impl FromRequestParts<AppState> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(user_id) = state.jwt_service.extract_user_from_headers(&parts.headers)? else {
            return Ok(Self(None));
        };

        let actor = state.user_service.resolve_actor(user_id).await?;
        // 封禁用户在读取路径和请求体之前就被转走
        if actor.roles.is_banned() {
            tracing::info!(user_id = %user_id, "banned user redirected");
            return Err(ApiError::banned());
        }
        Ok(Self(Some(actor)))
    }
}

/// 登录响应结构
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: UserDto,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> JwtService {
        JwtService::new(JwtConfig::default())
    }

    #[test]
    fn token_round_trip() {
        let service = service();
        let user_id = Uuid::new_v4();
        let token = service.generate_token(user_id).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        assert_eq!(
            service.extract_user_from_headers(&headers).unwrap(),
            Some(user_id)
        );
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert_eq!(
            service().extract_user_from_headers(&HeaderMap::new()).unwrap(),
            None
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Token abc"));
        assert!(service().extract_user_from_headers(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        assert!(service().extract_user_from_headers(&headers).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = JwtService::new(JwtConfig {
            secret: "another-secret-that-is-long-enough-to-pass".into(),
            expiration_hours: 1,
        });
        let token = other.generate_token(Uuid::new_v4()).unwrap();
        assert!(service().verify_token(&token).is_err());
    }
}
