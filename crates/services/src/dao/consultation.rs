use bson::{DateTime, Document, doc, oid::ObjectId};
use finadvise_db::models::{Consultation, ConsultationStatus, Feedback, TranscriptEntry};
use mongodb::Database;
use tracing::info;

use super::base::{BaseDao, DaoError, DaoResult, PaginatedResult, PaginationParams};

/// Fields supplied by the caller when a consultation is booked.
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub goals: Option<String>,
    pub date: String,
    pub duration: String,
    pub status: ConsultationStatus,
    pub agent_name: String,
    pub summary: String,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConsultationPatch {
    pub status: Option<ConsultationStatus>,
    pub duration: Option<String>,
    pub summary: Option<String>,
    pub title: Option<String>,
}

impl ConsultationPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.duration.is_none()
            && self.summary.is_none()
            && self.title.is_none()
    }

    fn to_set(&self) -> DaoResult<Document> {
        let mut set = Document::new();
        if let Some(status) = &self.status {
            set.insert("status", bson::to_bson(status)?);
        }
        if let Some(duration) = &self.duration {
            set.insert("duration", duration.as_str());
        }
        if let Some(summary) = &self.summary {
            set.insert("summary", summary.as_str());
        }
        if let Some(title) = &self.title {
            set.insert("title", title.as_str());
        }
        Ok(set)
    }
}

/// Every method takes the owner's subject and scopes its filter by it, so a
/// consultation owned by someone else is indistinguishable from a missing one.
pub struct ConsultationDao {
    pub base: BaseDao<Consultation>,
}

impl ConsultationDao {
    pub fn new(db: &Database) -> Self {
        Self {
            base: BaseDao::new(db, Consultation::COLLECTION),
        }
    }

    pub async fn create(
        &self,
        owner_id: &str,
        owner_email: &str,
        new: NewConsultation,
    ) -> DaoResult<Consultation> {
        let now = DateTime::now();
        let consultation = Consultation {
            id: None,
            user_id: owner_id.to_string(),
            user_email: owner_email.to_string(),
            title: new.title,
            category: new.category,
            description: new.description,
            goals: new.goals,
            date: new.date,
            duration: new.duration,
            status: new.status,
            agent_name: new.agent_name,
            summary: new.summary,
            feedback: None,
            report: None,
            transcript: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        let id = self.base.insert_one(&consultation).await?;
        info!(%id, owner = %owner_id, "Consultation created");
        self.find_for_owner(owner_id, id).await
    }

    pub async fn list_for_owner(
        &self,
        owner_id: &str,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Consultation>> {
        self.base
            .find_paginated(
                doc! { "user_id": owner_id },
                Some(doc! { "created_at": -1 }),
                params,
            )
            .await
    }

    pub async fn find_for_owner(&self, owner_id: &str, id: ObjectId) -> DaoResult<Consultation> {
        self.base
            .find_one(owned(owner_id, id))
            .await?
            .ok_or(DaoError::NotFound)
    }

    pub async fn update_for_owner(
        &self,
        owner_id: &str,
        id: ObjectId,
        patch: &ConsultationPatch,
    ) -> DaoResult<Consultation> {
        self.base
            .update_and_fetch(owned(owner_id, id), doc! { "$set": patch.to_set()? })
            .await
    }

    pub async fn set_status(
        &self,
        owner_id: &str,
        id: ObjectId,
        status: ConsultationStatus,
    ) -> DaoResult<Consultation> {
        let patch = ConsultationPatch {
            status: Some(status),
            ..Default::default()
        };
        self.update_for_owner(owner_id, id, &patch).await
    }

    pub async fn set_feedback(
        &self,
        owner_id: &str,
        id: ObjectId,
        feedback: &Feedback,
    ) -> DaoResult<Consultation> {
        self.base
            .update_and_fetch(
                owned(owner_id, id),
                doc! { "$set": { "feedback": bson::to_bson(feedback)? } },
            )
            .await
    }

    /// Stores the finalized call transcript and marks the consultation completed.
    pub async fn save_transcript(
        &self,
        owner_id: &str,
        id: ObjectId,
        entries: &[TranscriptEntry],
    ) -> DaoResult<Consultation> {
        let entries = bson::to_bson(entries)?;
        let status = bson::to_bson(&ConsultationStatus::Completed)?;
        let updated = self
            .base
            .update_and_fetch(
                owned(owner_id, id),
                doc! { "$set": { "transcript": entries, "status": status } },
            )
            .await?;
        info!(%id, message_count = updated.transcript.len(), "Consultation transcript saved");
        Ok(updated)
    }

    pub async fn delete_for_owner(&self, owner_id: &str, id: ObjectId) -> DaoResult<bool> {
        self.base.delete_one(owned(owner_id, id)).await
    }
}

fn owned(owner_id: &str, id: ObjectId) -> Document {
    doc! { "_id": id, "user_id": owner_id }
}
