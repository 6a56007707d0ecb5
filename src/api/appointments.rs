use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use serde_json::json;

use crate::models::appointment::{self, AppointmentDto, Entity as Appointment};
use crate::models::lead::Entity as Lead;

#[derive(Debug, Deserialize)]
pub struct AppointmentsQuery {
    pub lead_id: Option<i32>,
    pub status: Option<String>,
}

pub async fn list_appointments(
    State(db): State<DatabaseConnection>,
    Query(params): Query<AppointmentsQuery>,
) -> impl IntoResponse {
    let mut query = Appointment::find().order_by_asc(appointment::Column::ScheduledAt);

    if let Some(lead_id) = params.lead_id {
        query = query.filter(appointment::Column::LeadId.eq(lead_id));
    }
    if let Some(status) = params.status {
        query = query.filter(appointment::Column::Status.eq(status));
    }

    match query.all(&db).await {
        Ok(appointments) => {
            let dtos: Vec<AppointmentDto> =
                appointments.into_iter().map(AppointmentDto::from).collect();
            Json(json!({ "appointments": dtos, "total": dtos.len() })).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn get_appointment(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Appointment::find_by_id(id).one(&db).await {
        Ok(Some(model)) => {
            Json(json!({ "appointment": AppointmentDto::from(model) })).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Appointment not found" })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn create_appointment(
    State(db): State<DatabaseConnection>,
    Json(dto): Json<AppointmentDto>,
) -> impl IntoResponse {
    // Reject appointments for unknown leads up front
    match Lead::find_by_id(dto.lead_id).one(&db).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "Lead not found" })),
            )
                .into_response()
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
                .into_response()
        }
    }

    let now = chrono::Utc::now().to_rfc3339();

    let new_appointment = appointment::ActiveModel {
        lead_id: Set(dto.lead_id),
        scheduled_at: Set(dto.scheduled_at),
        kind: Set(dto.kind),
        status: Set(dto.status.unwrap_or_else(|| "scheduled".to_string())),
        notes: Set(dto.notes),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    match new_appointment.insert(&db).await {
        Ok(model) => (
            StatusCode::CREATED,
            Json(json!({
                "appointment": AppointmentDto::from(model),
                "message": "Appointment created successfully"
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}

pub async fn update_appointment(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(dto): Json<AppointmentDto>,
) -> impl IntoResponse {
    let appointment = Appointment::find_by_id(id).one(&db).await.unwrap_or(None);

    if let Some(appointment) = appointment {
        let mut active: appointment::ActiveModel = appointment.into();
        active.scheduled_at = Set(dto.scheduled_at);
        active.kind = Set(dto.kind);
        if let Some(status) = dto.status {
            active.status = Set(status);
        }
        active.notes = Set(dto.notes);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        match active.update(&db).await {
            Ok(model) => {
                Json(json!({ "appointment": AppointmentDto::from(model) })).into_response()
            }
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error", "details": e.to_string() })),
            )
                .into_response(),
        }
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Appointment not found" })),
        )
            .into_response()
    }
}

pub async fn delete_appointment(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    match Appointment::delete_by_id(id).exec(&db).await {
        Ok(_) => Json(json!({ "message": "Appointment deleted successfully" })).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "Internal server error", "details": e.to_string() })),
        )
            .into_response(),
    }
}
