//! Handlers for the current user's location preferences.

use crate::{
    App, Backend, CurrentUser, EmailSender, LocationPreferences, LocationPreferencesUpdate,
    error::{AppError, ErrorResponse},
    extractors::JsonBody,
};
use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::{OpenApi, ToSchema};

pub const LOCATION_PREFERENCES_PATH: &str = "/api/user/location-preferences";

/// Search radius used when the request omits one.
pub const DEFAULT_RADIUS_KM: f64 = 25.0;
pub const MAX_RADIUS_KM: f64 = 500.0;

#[derive(OpenApi)]
#[openapi(
    paths(location_preferences_get, location_preferences_set),
    components(schemas(
        LocationPreferencesRequest,
        LocationPreferencesResponse,
        LocationPreferences,
        ErrorResponse
    ))
)]
pub(crate) struct LocationApi;

/// Returns routes for location preferences.
pub fn location_routes<B: Backend, E: EmailSender>() -> Router<App<B, E>> {
    Router::new().route(
        LOCATION_PREFERENCES_PATH,
        get(location_preferences_get::<B, E>).post(location_preferences_set::<B, E>),
    )
}

/// Request body for saving location preferences.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationPreferencesRequest {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub categories: Option<Vec<String>>,
}

/// Response for both location endpoints. `preferences` is `null` until first saved.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationPreferencesResponse {
    pub success: bool,
    pub preferences: Option<LocationPreferences>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl LocationPreferencesRequest {
    fn into_update(self) -> Result<LocationPreferencesUpdate, AppError> {
        let city = non_blank(self.city);

        let (latitude, longitude) = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => (Some(lat), Some(lon)),
            (None, None) => (None, None),
            _ => {
                return Err(AppError::Validation(
                    "Latitude and longitude must be provided together".to_string(),
                ));
            }
        };

        if city.is_none() && latitude.is_none() {
            return Err(AppError::Validation(
                "Either city or latitude and longitude are required".to_string(),
            ));
        }

        if let Some(lat) = latitude
            && !(lat.is_finite() && (-90.0..=90.0).contains(&lat))
        {
            return Err(AppError::Validation(
                "Latitude must be between -90 and 90".to_string(),
            ));
        }

        if let Some(lon) = longitude
            && !(lon.is_finite() && (-180.0..=180.0).contains(&lon))
        {
            return Err(AppError::Validation(
                "Longitude must be between -180 and 180".to_string(),
            ));
        }

        let radius_km = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
        if !(radius_km.is_finite() && radius_km > 0.0 && radius_km <= MAX_RADIUS_KM) {
            return Err(AppError::Validation(format!(
                "Radius must be greater than 0 and at most {MAX_RADIUS_KM} km"
            )));
        }

        let mut seen = HashSet::new();
        let categories: Vec<String> = self
            .categories
            .unwrap_or_default()
            .into_iter()
            .filter_map(|c| non_blank(Some(c)))
            .filter(|c| seen.insert(c.clone()))
            .collect();

        Ok(LocationPreferencesUpdate {
            city,
            region: non_blank(self.region),
            country: non_blank(self.country),
            latitude,
            longitude,
            radius_km,
            categories,
        })
    }
}

/// Get the current user's location preferences.
#[utoipa::path(
    get,
    path = "",
    responses(
        (status = OK, body = LocationPreferencesResponse),
        (status = UNAUTHORIZED, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn location_preferences_get<B: Backend, E: EmailSender>(
    current_user: CurrentUser,
    State(app): State<App<B, E>>,
) -> Result<Json<LocationPreferencesResponse>, AppError> {
    let preferences = app
        .backend()
        .location_preferences_get(current_user.user_id)
        .await
        .map_err(AppError::from_backend)?;

    Ok(Json(LocationPreferencesResponse {
        success: true,
        preferences,
    }))
}

/// Save the current user's location preferences.
#[utoipa::path(
    post,
    path = "",
    request_body = LocationPreferencesRequest,
    responses(
        (status = OK, body = LocationPreferencesResponse),
        (status = BAD_REQUEST, body = ErrorResponse),
        (status = UNAUTHORIZED, body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, body = ErrorResponse)
    )
)]
pub async fn location_preferences_set<B: Backend, E: EmailSender>(
    current_user: CurrentUser,
    State(app): State<App<B, E>>,
    JsonBody(req): JsonBody<LocationPreferencesRequest>,
) -> Result<Json<LocationPreferencesResponse>, AppError> {
    let update = req.into_update()?;

    let preferences = app
        .backend()
        .location_preferences_set(current_user.user_id, &update)
        .await
        .map_err(AppError::from_backend)?;

    tracing::info!(user_id = %current_user.user_id, "location preferences saved");

    Ok(Json(LocationPreferencesResponse {
        success: true,
        preferences: Some(preferences),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejects(req: LocationPreferencesRequest) -> String {
        req.into_update().unwrap_err().to_string()
    }

    #[test]
    fn city_alone_is_enough() {
        let update = LocationPreferencesRequest {
            city: Some(" Lisbon ".to_string()),
            ..Default::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.city.as_deref(), Some("Lisbon"));
        assert_eq!(update.radius_km, DEFAULT_RADIUS_KM);
        assert!(update.categories.is_empty());
    }

    #[test]
    fn coordinates_alone_are_enough() {
        let update = LocationPreferencesRequest {
            latitude: Some(38.72),
            longitude: Some(-9.14),
            radius_km: Some(500.0),
            categories: Some(vec!["cafe".into(), " ".into(), "bakery".into()]),
            ..Default::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.city, None);
        assert_eq!(update.categories, vec!["cafe", "bakery"]);
    }

    #[test]
    fn location_is_required() {
        assert_eq!(
            rejects(LocationPreferencesRequest {
                city: Some("  ".to_string()),
                ..Default::default()
            }),
            "Either city or latitude and longitude are required"
        );
        assert_eq!(
            rejects(LocationPreferencesRequest {
                latitude: Some(10.0),
                ..Default::default()
            }),
            "Latitude and longitude must be provided together"
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let with = |lat: f64, lon: f64, radius: Option<f64>| LocationPreferencesRequest {
            latitude: Some(lat),
            longitude: Some(lon),
            radius_km: radius,
            ..Default::default()
        };

        assert!(rejects(with(90.5, 0.0, None)).starts_with("Latitude"));
        assert!(rejects(with(0.0, -180.1, None)).starts_with("Longitude"));
        assert!(rejects(with(f64::NAN, 0.0, None)).starts_with("Latitude"));
        assert!(rejects(with(0.0, 0.0, Some(0.0))).starts_with("Radius"));
        assert!(rejects(with(0.0, 0.0, Some(500.1))).starts_with("Radius"));
        assert!(with(-90.0, 180.0, Some(0.5)).into_update().is_ok());
    }

    #[test]
    fn repeated_categories_keep_first_occurrence() {
        let update = LocationPreferencesRequest {
            city: Some("Porto".to_string()),
            categories: Some(vec![
                "cafe".into(),
                "bakery".into(),
                " cafe ".into(),
                "bakery".into(),
                "park".into(),
            ]),
            ..Default::default()
        }
        .into_update()
        .unwrap();

        assert_eq!(update.categories, vec!["cafe", "bakery", "park"]);
    }
}
