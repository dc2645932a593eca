use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub member_id: i64,
    pub email: String,
    pub name: String,
}

// Структура для результата из БД
#[derive(sqlx::FromRow)]
struct MemberRow {
    id: i64,
    email: String,
    password_hash: String,
    name: String,
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

        // Разделяем email:password
        let mut parts = credentials.splitn(2, ':');
        let email = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;
        let password = parts.next().ok_or(StatusCode::UNAUTHORIZED)?;

        let row: Option<MemberRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name
             FROM members
             WHERE email = $1 AND is_active = TRUE",
        )
        .bind(email)
        .fetch_optional(&state.db.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let member = row.ok_or(StatusCode::UNAUTHORIZED)?;

        if !bcrypt::verify(password, &member.password_hash).unwrap_or(false) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        // Обновляем last_logged_in, ошибку игнорируем
        sqlx::query("UPDATE members SET last_logged_in = NOW() WHERE id = $1")
            .bind(member.id)
            .execute(&state.db.pool)
            .await
            .ok();

        Ok(AuthUser {
            member_id: member.id,
            email: member.email,
            name: member.name,
        })
    }
}
