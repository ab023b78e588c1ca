use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::DateTime;
use finadvise_db::models::{Consultation, ConsultationStatus, Feedback, Report};
use finadvise_services::dao::{
    base::PaginationParams,
    consultation::{ConsultationPatch, NewConsultation},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::parse_id;
use crate::{error::ApiError, extractors::auth::AuthUser, live, state::AppState};

#[derive(Debug, Serialize)]
pub struct ConsultationResponse {
    pub id: String,
    pub user_id: String,
    pub user_email: String,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub goals: Option<String>,
    pub date: String,
    pub duration: String,
    pub status: ConsultationStatus,
    pub agent_name: String,
    pub summary: String,
    pub feedback: Option<FeedbackResponse>,
    pub report: Option<Report>,
    pub transcript_length: usize,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub rating: u8,
    pub comment: String,
    pub helpfulness: u8,
    pub clarity: u8,
    pub timestamp: String,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = state
        .consultations
        .list_for_owner(&auth.user_id, &params)
        .await?
        .map(to_response);

    Ok(Json(serde_json::json!({
        "items": result.items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConsultationRequest {
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub category: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 2000))]
    pub goals: Option<String>,
    #[validate(length(min = 1))]
    pub date: String,
    #[validate(length(min = 1))]
    pub duration: String,
    pub status: Option<ConsultationStatus>,
    #[serde(alias = "agentName")]
    #[validate(length(min = 1, max = 100))]
    pub agent_name: String,
    pub summary: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateConsultationRequest>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    body.validate()?;

    if body.user_id.as_deref().is_some_and(|id| id != auth.user_id) {
        return Err(ApiError::Forbidden(
            "Cannot create a consultation for another user".to_string(),
        ));
    }

    let consultation = state
        .consultations
        .create(
            &auth.user_id,
            &auth.email,
            NewConsultation {
                title: body.title,
                category: body.category,
                description: body.description,
                goals: body.goals,
                date: body.date,
                duration: body.duration,
                status: body.status.unwrap_or_default(),
                agent_name: body.agent_name,
                summary: body.summary.unwrap_or_default(),
            },
        )
        .await?;

    Ok(Json(to_response(consultation)))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;
    let consultation = state.consultations.find_for_owner(&auth.user_id, id).await?;
    Ok(Json(to_response(consultation)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConsultationRequest {
    pub status: Option<ConsultationStatus>,
    #[validate(length(min = 1))]
    pub duration: Option<String>,
    pub summary: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
    Json(body): Json<UpdateConsultationRequest>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;
    body.validate()?;

    let patch = ConsultationPatch {
        status: body.status,
        duration: body.duration,
        summary: body.summary,
        title: body.title,
    };
    if patch.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }

    let consultation = state
        .consultations
        .update_for_owner(&auth.user_id, id, &patch)
        .await?;
    Ok(Json(to_response(consultation)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;

    if !state.consultations.delete_for_owner(&auth.user_id, id).await? {
        return Err(ApiError::NotFound("Consultation not found".to_string()));
    }

    // A call still running for a deleted consultation has nowhere to persist.
    state.transcripts.end_session(&live::session_key(id)).await;

    info!(consultation_id = %id, "Consultation deleted");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Deserialize, Validate)]
pub struct FeedbackRequest {
    #[validate(range(min = 1, max = 5))]
    pub rating: u8,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: String,
    #[validate(range(min = 1, max = 5))]
    pub helpfulness: u8,
    #[validate(range(min = 1, max = 5))]
    pub clarity: u8,
}

pub async fn feedback(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
    Json(body): Json<FeedbackRequest>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;
    body.validate()?;

    let feedback = Feedback {
        rating: body.rating,
        comment: body.comment,
        helpfulness: body.helpfulness,
        clarity: body.clarity,
        timestamp: DateTime::now(),
    };
    let consultation = state
        .consultations
        .set_feedback(&auth.user_id, id, &feedback)
        .await?;
    Ok(Json(to_response(consultation)))
}

pub async fn transcript(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;
    let consultation = state.consultations.find_for_owner(&auth.user_id, id).await?;

    let messages: Vec<serde_json::Value> = consultation
        .transcript
        .iter()
        .map(|entry| {
            serde_json::json!({
                "speaker": entry.speaker,
                "text": entry.text,
                "created_at": entry.created_at.try_to_rfc3339_string().unwrap_or_default(),
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "consultation_id": id.to_hex(),
        "status": consultation.status,
        "messages": messages,
    })))
}

/// Ends the live call of a consultation from outside the socket, persisting
/// whatever the session has finalized.
pub async fn end_call(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(consultation_id): Path<String>,
) -> Result<Json<ConsultationResponse>, ApiError> {
    let id = parse_id(&consultation_id, "consultation_id")?;
    state.consultations.find_for_owner(&auth.user_id, id).await?;
    let consultation = live::finish_call(&state, &auth.user_id, id).await?;
    Ok(Json(to_response(consultation)))
}

fn to_response(c: Consultation) -> ConsultationResponse {
    ConsultationResponse {
        id: c.id.map(|id| id.to_hex()).unwrap_or_default(),
        user_id: c.user_id,
        user_email: c.user_email,
        title: c.title,
        category: c.category,
        description: c.description,
        goals: c.goals,
        date: c.date,
        duration: c.duration,
        status: c.status,
        agent_name: c.agent_name,
        summary: c.summary,
        feedback: c.feedback.map(|f| FeedbackResponse {
            rating: f.rating,
            comment: f.comment,
            helpfulness: f.helpfulness,
            clarity: f.clarity,
            timestamp: f.timestamp.try_to_rfc3339_string().unwrap_or_default(),
        }),
        report: c.report,
        transcript_length: c.transcript.len(),
        created_at: c.created_at.try_to_rfc3339_string().unwrap_or_default(),
        updated_at: c.updated_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
