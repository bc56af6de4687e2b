//! [`Backend`] over the hosted database's PostgREST endpoint.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use super::query::{
    ConfirmationTokens, LocationColumn, LocationPreferencesTable, Query, Table, TokenColumn,
    UserColumn, Users,
};
use crate::{
    backend::{
        Backend, ConfirmationToken, ConsumeOutcome, LocationPreferences,
        LocationPreferencesUpdate, NewUser, ProfileUpdate, UserAccount,
    },
    config::AppConfig,
    verification::TokenKind,
};

const UPDATE_LOCATION_PREFERENCES_RPC: &str = "update_location_preferences";

/// Database gateway errors.
#[derive(Debug, Error)]
pub enum PostgrestError {
    /// Required gateway settings are missing.
    #[error("database gateway not configured: {0} is not set")]
    NotConfigured(&'static str),

    /// Transport-level failure.
    #[error("database request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with a non-success status.
    #[error("database returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The gateway answered with an unexpected shape.
    #[error("unexpected database response: {0}")]
    Unexpected(String),
}

impl PostgrestError {
    fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Status { status: 409, .. })
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    message: Option<String>,
    details: Option<String>,
}

/// Backend talking to `{SUPABASE_URL}/rest/v1` with the service-role key.
///
/// Cheap to clone; all clones share one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct PostgrestBackend {
    client: reqwest::Client,
    base_url: Option<String>,
    service_key: Option<String>,
}

impl PostgrestBackend {
    pub fn new(
        client: reqwest::Client,
        base_url: Option<String>,
        service_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
            service_key,
        }
    }

    /// Build a backend from `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`.
    pub fn from_config(client: reqwest::Client, config: &AppConfig) -> Self {
        Self::new(
            client,
            config.database_url.clone(),
            config.database_service_key.clone(),
        )
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PostgrestError> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or(PostgrestError::NotConfigured("SUPABASE_URL"))?;
        let key = self
            .service_key
            .as_deref()
            .ok_or(PostgrestError::NotConfigured("SUPABASE_SERVICE_ROLE_KEY"))?;

        Ok(self
            .client
            .request(method, format!("{base_url}/rest/v1/{path}"))
            .header("apikey", key)
            .bearer_auth(key))
    }

    async fn check(response: Response) -> Result<Response, PostgrestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<PostgrestErrorBody>(&raw) {
            Ok(PostgrestErrorBody {
                message: Some(message),
                details,
            }) => match details {
                Some(details) => format!("{message} ({details})"),
                None => message,
            },
            _ => raw,
        };

        Err(PostgrestError::Status {
            status: status.as_u16(),
            message,
        })
    }

    /// `GET /{table}?select=*&...`
    pub async fn select<T: Table, R: DeserializeOwned>(
        &self,
        query: &Query<T>,
    ) -> Result<Vec<R>, PostgrestError> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        pairs.extend(query.to_pairs());

        let response = self.request(Method::GET, T::NAME)?.query(&pairs).send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// `POST /{table}` returning the inserted rows.
    pub async fn insert<T: Table, B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        body: &B,
    ) -> Result<Vec<R>, PostgrestError> {
        let response = self
            .request(Method::POST, T::NAME)?
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// `PATCH /{table}?...` returning the updated rows.
    pub async fn update<T: Table, B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        query: &Query<T>,
        body: &B,
    ) -> Result<Vec<R>, PostgrestError> {
        let response = self
            .request(Method::PATCH, T::NAME)?
            .header("Prefer", "return=representation")
            .query(&query.to_pairs())
            .json(body)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    /// `DELETE /{table}?...` returning how many rows were removed.
    pub async fn delete<T: Table>(&self, query: &Query<T>) -> Result<u64, PostgrestError> {
        let response = self
            .request(Method::DELETE, T::NAME)?
            .header("Prefer", "return=representation")
            .query(&query.to_pairs())
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = Self::check(response).await?.json().await?;
        Ok(rows.len() as u64)
    }

    /// `POST /rpc/{name}`
    pub async fn rpc<A: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        name: &str,
        args: &A,
    ) -> Result<R, PostgrestError> {
        let response = self
            .request(Method::POST, &format!("rpc/{name}"))?
            .json(args)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn user_select_one(
        &self,
        query: Query<Users>,
    ) -> Result<Option<UserAccount>, PostgrestError> {
        let rows: Vec<UserAccount> = self.select(&query.limit(1)).await?;
        Ok(rows.into_iter().next())
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Serialize)]
struct VerifiedPatch {
    email_verified: bool,
    email_verified_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LastSignInPatch {
    last_sign_in_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct PasswordPatch<'a> {
    password_hash: &'a str,
}

#[derive(Serialize)]
struct ConsumedPatch {
    consumed_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct LocationPreferencesArgs<'a> {
    p_user_id: Uuid,
    p_city: Option<&'a str>,
    p_region: Option<&'a str>,
    p_country: Option<&'a str>,
    p_latitude: Option<f64>,
    p_longitude: Option<f64>,
    p_radius_km: f64,
    p_categories: &'a [String],
}

impl Backend for PostgrestBackend {
    type Error = PostgrestError;

    async fn user_find_by_email(&self, email: &str) -> Result<Option<UserAccount>, Self::Error> {
        self.user_select_one(Query::new().eq(UserColumn::Email, email)).await
    }

    async fn user_get_by_id(&self, id: Uuid) -> Result<Option<UserAccount>, Self::Error> {
        self.user_select_one(Query::new().eq(UserColumn::Id, id)).await
    }

    async fn user_create(&self, user: &NewUser) -> Result<Option<UserAccount>, Self::Error> {
        match self.insert::<Users, _, UserAccount>(user).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .map(Some)
                .ok_or_else(|| PostgrestError::Unexpected("insert returned no rows".to_string())),
            Err(e) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn user_last_sign_in_update(&self, id: Uuid) -> Result<(), Self::Error> {
        let patch = LastSignInPatch {
            last_sign_in_at: Utc::now(),
        };
        let _: Vec<UserAccount> = self
            .update(&Query::<Users>::new().eq(UserColumn::Id, id), &patch)
            .await?;
        Ok(())
    }

    async fn user_mark_verified(&self, id: Uuid) -> Result<bool, Self::Error> {
        let patch = VerifiedPatch {
            email_verified: true,
            email_verified_at: Utc::now(),
        };
        let rows: Vec<UserAccount> = self
            .update(&Query::<Users>::new().eq(UserColumn::Id, id), &patch)
            .await?;
        Ok(!rows.is_empty())
    }

    async fn user_password_update(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, Self::Error> {
        let rows: Vec<UserAccount> = self
            .update(
                &Query::<Users>::new().eq(UserColumn::Id, id),
                &PasswordPatch { password_hash },
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn user_profile_update(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> Result<Option<UserAccount>, Self::Error> {
        let rows: Vec<UserAccount> = self
            .update(&Query::<Users>::new().eq(UserColumn::Id, id), update)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn token_insert(&self, token: &ConfirmationToken) -> Result<(), Self::Error> {
        let _: Vec<ConfirmationToken> = self.insert::<ConfirmationTokens, _, _>(token).await?;
        Ok(())
    }

    async fn token_consume(
        &self,
        token_hash: &str,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, Self::Error> {
        // Single conditional write; the database decides which concurrent caller wins.
        let consumed: Vec<ConfirmationToken> = self
            .update(
                &Query::<ConfirmationTokens>::new()
                    .eq(TokenColumn::TokenHash, token_hash)
                    .eq(TokenColumn::Kind, kind)
                    .is_null(TokenColumn::ConsumedAt)
                    .gt(TokenColumn::ExpiresAt, timestamp(now)),
                &ConsumedPatch { consumed_at: now },
            )
            .await?;

        if let Some(row) = consumed.into_iter().next() {
            return Ok(ConsumeOutcome::Consumed {
                user_id: row.user_id,
            });
        }

        // Nothing matched: read once to explain why.
        let rows: Vec<ConfirmationToken> = self
            .select(
                &Query::<ConfirmationTokens>::new()
                    .eq(TokenColumn::TokenHash, token_hash)
                    .eq(TokenColumn::Kind, kind)
                    .limit(1),
            )
            .await?;

        Ok(match rows.into_iter().next() {
            None => ConsumeOutcome::NotFound,
            Some(row) if row.consumed_at.is_some() => ConsumeOutcome::AlreadyConsumed,
            Some(_) => ConsumeOutcome::Expired,
        })
    }

    async fn token_purge(&self, cutoff: DateTime<Utc>) -> Result<u64, Self::Error> {
        let expired = self
            .delete(
                &Query::<ConfirmationTokens>::new().lt(TokenColumn::ExpiresAt, timestamp(cutoff)),
            )
            .await?;
        let consumed = self
            .delete(
                &Query::<ConfirmationTokens>::new().lt(TokenColumn::ConsumedAt, timestamp(cutoff)),
            )
            .await?;
        Ok(expired + consumed)
    }

    async fn location_preferences_get(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LocationPreferences>, Self::Error> {
        let rows: Vec<LocationPreferences> = self
            .select(
                &Query::<LocationPreferencesTable>::new()
                    .eq(LocationColumn::UserId, user_id)
                    .limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn location_preferences_set(
        &self,
        user_id: Uuid,
        update: &LocationPreferencesUpdate,
    ) -> Result<LocationPreferences, Self::Error> {
        let args = LocationPreferencesArgs {
            p_user_id: user_id,
            p_city: update.city.as_deref(),
            p_region: update.region.as_deref(),
            p_country: update.country.as_deref(),
            p_latitude: update.latitude,
            p_longitude: update.longitude,
            p_radius_km: update.radius_km,
            p_categories: &update.categories,
        };
        self.rpc(UPDATE_LOCATION_PREFERENCES_RPC, &args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::App;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const KEY: &str = "service-role-key";
    const TOKENS_PATH: &str = "/rest/v1/confirmation_tokens";
    const USERS_PATH: &str = "/rest/v1/users";

    fn backend(server: &MockServer) -> PostgrestBackend {
        PostgrestBackend::new(
            reqwest::Client::new(),
            Some(server.base_url()),
            Some(KEY.to_string()),
        )
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn token_row(user_id: Uuid, consumed_at: Option<&str>) -> Value {
        json!({
            "token_hash": "h",
            "user_id": user_id,
            "kind": "email_verification",
            "created_at": "2026-03-01T08:00:00Z",
            "expires_at": "2026-03-02T08:00:00Z",
            "consumed_at": consumed_at,
        })
    }

    fn user_row(id: Uuid, email: &str) -> Value {
        json!({
            "id": id,
            "email": email,
            "username": "ana",
            "password_hash": "hash",
            "email_verified": false,
            "email_verified_at": null,
            "full_name": null,
            "avatar_url": null,
            "bio": null,
            "created_at": "2026-03-01T08:00:00Z",
            "last_sign_in_at": null,
        })
    }

    #[tokio::test]
    async fn unconfigured_backend_reports_missing_variable() {
        let backend = PostgrestBackend::new(reqwest::Client::new(), None, None);
        let err = backend.user_find_by_email("a@b.co").await.unwrap_err();
        assert!(matches!(err, PostgrestError::NotConfigured("SUPABASE_URL")));

        let backend = PostgrestBackend::new(
            reqwest::Client::new(),
            Some("http://localhost:54321".to_string()),
            None,
        );
        let err = backend.user_get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            PostgrestError::NotConfigured("SUPABASE_SERVICE_ROLE_KEY")
        ));
    }

    #[test]
    fn only_conflicts_count_as_unique_violations() {
        let conflict = PostgrestError::Status {
            status: 409,
            message: "duplicate key".into(),
        };
        let other = PostgrestError::Status {
            status: 400,
            message: "bad".into(),
        };
        assert!(conflict.is_unique_violation());
        assert!(!other.is_unique_violation());
    }

    #[test]
    fn timestamps_are_utc_rfc3339() {
        let at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(at), "2026-03-01T08:00:00.000000Z");
    }

    #[tokio::test]
    async fn consume_is_one_conditional_patch() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();

        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path(TOKENS_PATH)
                    .header("apikey", KEY)
                    .header("authorization", format!("Bearer {KEY}"))
                    .header("prefer", "return=representation")
                    .query_param("token_hash", "eq.h")
                    .query_param("kind", "eq.email_verification")
                    .query_param("consumed_at", "is.null")
                    .query_param("expires_at", "gt.2026-03-01T12:00:00.000000Z");
                then.status(200)
                    .json_body(json!([token_row(user_id, Some("2026-03-01T12:00:00Z"))]));
            })
            .await;
        let read = server
            .mock_async(|when, then| {
                when.method(GET).path(TOKENS_PATH);
                then.status(200).json_body(json!([]));
            })
            .await;

        let outcome = backend(&server)
            .token_consume("h", TokenKind::EmailVerification, now())
            .await
            .unwrap();

        assert_eq!(outcome, ConsumeOutcome::Consumed { user_id });
        patch.assert_async().await;
        assert_eq!(read.hits_async().await, 0);
    }

    async fn consume_after_miss(row: Option<Value>) -> ConsumeOutcome {
        let server = MockServer::start_async().await;
        let patch = server
            .mock_async(|when, then| {
                when.method(PATCH).path(TOKENS_PATH);
                then.status(200).json_body(json!([]));
            })
            .await;
        let read = server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path(TOKENS_PATH)
                    .query_param("select", "*")
                    .query_param("token_hash", "eq.h")
                    .query_param("kind", "eq.email_verification")
                    .query_param("limit", "1");
                then.status(200)
                    .json_body(Value::Array(row.into_iter().collect()));
            })
            .await;

        let outcome = backend(&server)
            .token_consume("h", TokenKind::EmailVerification, now())
            .await
            .unwrap();

        patch.assert_async().await;
        read.assert_async().await;
        outcome
    }

    #[tokio::test]
    async fn missed_consume_is_classified_by_one_read() {
        let user_id = Uuid::new_v4();

        assert_eq!(consume_after_miss(None).await, ConsumeOutcome::NotFound);
        assert_eq!(
            consume_after_miss(Some(token_row(user_id, Some("2026-03-01T09:00:00Z")))).await,
            ConsumeOutcome::AlreadyConsumed
        );
        assert_eq!(
            consume_after_miss(Some(token_row(user_id, None))).await,
            ConsumeOutcome::Expired
        );
    }

    #[tokio::test]
    async fn gateway_error_body_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH).path(TOKENS_PATH);
                then.status(500)
                    .json_body(json!({ "message": "connection refused", "details": "pool" }));
            })
            .await;

        let err = backend(&server)
            .token_consume("h", TokenKind::PasswordReset, now())
            .await
            .unwrap_err();

        match err {
            PostgrestError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "connection refused (pool)");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn user_insert_conflict_means_existing_user() {
        let server = MockServer::start_async().await;
        let insert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(USERS_PATH)
                    .header("prefer", "return=representation");
                then.status(409).json_body(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint \"users_email_key\"",
                }));
            })
            .await;

        let created = backend(&server)
            .user_create(&NewUser {
                id: Uuid::new_v4(),
                email: "ana@example.com".to_string(),
                username: "ana".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(created, None);
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn user_insert_returns_created_row() {
        let server = MockServer::start_async().await;
        let id = Uuid::new_v4();
        server
            .mock_async(move |when, then| {
                when.method(POST).path(USERS_PATH).json_body(json!({
                    "id": id,
                    "email": "ana@example.com",
                    "username": "ana",
                    "password_hash": "hash",
                }));
                then.status(201).json_body(json!([user_row(id, "ana@example.com")]));
            })
            .await;

        let created = backend(&server)
            .user_create(&NewUser {
                id,
                email: "ana@example.com".to_string(),
                username: "ana".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
            .expect("created row");

        assert_eq!(created.id, id);
        assert!(!created.email_verified);
    }

    #[tokio::test]
    async fn register_conflict_from_database_is_bad_request() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(USERS_PATH)
                    .query_param("email", "eq.ana@example.com");
                then.status(200).json_body(json!([]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(USERS_PATH);
                then.status(409).json_body(json!({ "message": "duplicate key" }));
            })
            .await;

        let config = AppConfig {
            jwt_secret: "a".repeat(32),
            ..Default::default()
        };
        let router = App::new(config, backend(&server)).unwrap().router();
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({
                            "email": "Ana@Example.com",
                            "password": "SecurePass123",
                            "username": "ana",
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "User already exists");
    }

    #[tokio::test]
    async fn purge_sums_both_deletes() {
        let server = MockServer::start_async().await;
        let expired = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path(TOKENS_PATH)
                    .query_param("expires_at", "lt.2026-03-01T12:00:00.000000Z");
                then.status(200).json_body(json!([{ "token_hash": "a" }, { "token_hash": "b" }]));
            })
            .await;
        let consumed = server
            .mock_async(|when, then| {
                when.method(DELETE)
                    .path(TOKENS_PATH)
                    .query_param("consumed_at", "lt.2026-03-01T12:00:00.000000Z");
                then.status(200).json_body(json!([{ "token_hash": "c" }]));
            })
            .await;

        let removed = backend(&server).token_purge(now()).await.unwrap();

        assert_eq!(removed, 3);
        expired.assert_async().await;
        consumed.assert_async().await;
    }

    #[tokio::test]
    async fn location_preferences_write_through_rpc() {
        let server = MockServer::start_async().await;
        let user_id = Uuid::new_v4();
        let rpc = server
            .mock_async(move |when, then| {
                when.method(POST)
                    .path("/rest/v1/rpc/update_location_preferences")
                    .json_body(json!({
                        "p_user_id": user_id,
                        "p_city": "Lisbon",
                        "p_region": null,
                        "p_country": "PT",
                        "p_latitude": null,
                        "p_longitude": null,
                        "p_radius_km": 25.0,
                        "p_categories": ["cafe"],
                    }));
                then.status(200).json_body(json!({
                    "user_id": user_id,
                    "city": "Lisbon",
                    "region": null,
                    "country": "PT",
                    "latitude": null,
                    "longitude": null,
                    "radius_km": 25.0,
                    "categories": ["cafe"],
                    "updated_at": "2026-03-01T12:00:00Z",
                }));
            })
            .await;

        let saved = backend(&server)
            .location_preferences_set(
                user_id,
                &LocationPreferencesUpdate {
                    city: Some("Lisbon".to_string()),
                    region: None,
                    country: Some("PT".to_string()),
                    latitude: None,
                    longitude: None,
                    radius_km: 25.0,
                    categories: vec!["cafe".to_string()],
                },
            )
            .await
            .unwrap();

        rpc.assert_async().await;
        assert_eq!(saved.user_id, user_id);
        assert_eq!(saved.city.as_deref(), Some("Lisbon"));
    }
}
