use bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    /// Identity-provider subject of the owner. Every query is scoped by it.
    pub user_id: String,
    pub user_email: String,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub goals: Option<String>,
    pub date: String,
    pub duration: String,
    #[serde(default)]
    pub status: ConsultationStatus,
    pub agent_name: String,
    #[serde(default)]
    pub summary: String,
    pub feedback: Option<Feedback>,
    pub report: Option<Report>,
    #[serde(default)]
    pub transcript: Vec<TranscriptEntry>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConsultationStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: u8,
    pub comment: String,
    pub helpfulness: u8,
    pub clarity: u8,
    pub timestamp: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub overview: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub action_items: Vec<String>,
    pub risk_assessment: RiskAssessment,
    #[serde(default)]
    pub financial_metrics: Vec<FinancialMetric>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialMetric {
    pub label: String,
    pub value: String,
}

/// One finalized utterance of a consultation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// "user" or "agent".
    pub speaker: String,
    pub text: String,
    pub created_at: DateTime,
}

impl Consultation {
    pub const COLLECTION: &'static str = "consultations";
}
