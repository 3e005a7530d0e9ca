// src/target.rs

use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::Target;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetRequest {
    pub department_id: Option<String>,
    pub amount: Option<f64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Validates the target payload without touching storage. Returns the parsed
/// amount and date pair, or a field-specific validation error.
pub fn validate_target(
    amount: Option<f64>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Result<(f64, NaiveDate, NaiveDate), ApiError> {
    let amount = amount.ok_or_else(|| ApiError::validation("amount is required"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ApiError::validation("amount must be a positive number"));
    }

    let start_raw = start_date
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("startDate is required"))?;
    let end_raw = end_date
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("endDate is required"))?;

    let start = NaiveDate::parse_from_str(start_raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("startDate is not a valid date (YYYY-MM-DD)"))?;
    let end = NaiveDate::parse_from_str(end_raw, "%Y-%m-%d")
        .map_err(|_| ApiError::validation("endDate is not a valid date (YYYY-MM-DD)"))?;

    if start >= end {
        return Err(ApiError::validation("startDate must be before endDate"));
    }

    Ok((amount, start, end))
}

/// POST /target
pub async fn create_target(
    data: web::Data<AppState>,
    payload: web::Json<CreateTargetRequest>,
) -> Result<HttpResponse, ApiError> {
    let department_id = payload
        .department_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("departmentId is required"))?
        .to_string();

    let (amount, start, end) = validate_target(
        payload.amount,
        payload.start_date.as_deref(),
        payload.end_date.as_deref(),
    )?;

    if data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &department_id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("department not found"));
    }

    let new_target = Target {
        target_id: Uuid::new_v4().to_string(),
        department_id,
        amount,
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        created_at: Utc::now(),
    };
    data.mongodb.targets().insert_one(&new_target).await?;
    info!(
        "target of {} set for department {}",
        new_target.amount, new_target.department_id
    );

    Ok(HttpResponse::Ok().json(new_target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_a_well_formed_target() {
        let (amount, start, end) =
            validate_target(Some(1000.0), Some("2024-01-01"), Some("2024-12-31")).unwrap();
        assert_eq!(amount, 1000.0);
        assert!(start < end);
    }

    #[test]
    fn rejects_missing_amount() {
        let err = validate_target(None, Some("2024-01-01"), Some("2024-12-31")).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn rejects_non_positive_amount() {
        assert!(validate_target(Some(0.0), Some("2024-01-01"), Some("2024-12-31")).is_err());
        assert!(validate_target(Some(-5.0), Some("2024-01-01"), Some("2024-12-31")).is_err());
        assert!(validate_target(Some(f64::NAN), Some("2024-01-01"), Some("2024-12-31")).is_err());
    }

    #[test]
    fn rejects_unparseable_dates() {
        let err = validate_target(Some(10.0), Some("soon"), Some("2024-12-31")).unwrap_err();
        assert!(err.to_string().contains("startDate"));
        let err = validate_target(Some(10.0), Some("2024-01-01"), Some("31/12/2024")).unwrap_err();
        assert!(err.to_string().contains("endDate"));
    }

    #[test]
    fn rejects_start_not_strictly_before_end() {
        assert!(validate_target(Some(10.0), Some("2024-06-01"), Some("2024-06-01")).is_err());
        assert!(validate_target(Some(10.0), Some("2024-07-01"), Some("2024-06-01")).is_err());
    }

    #[test]
    fn rejects_missing_dates() {
        assert!(validate_target(Some(10.0), None, Some("2024-12-31")).is_err());
        assert!(validate_target(Some(10.0), Some("2024-01-01"), None).is_err());
        assert!(validate_target(Some(10.0), Some("  "), Some("2024-12-31")).is_err());
    }
}
