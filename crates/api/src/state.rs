use finadvise_config::{Settings, TranscriptSettings};
use finadvise_services::{
    AuthService,
    dao::{consultation::ConsultationDao, user::UserDao},
};
use finadvise_transcript::{PolicyParseError, TranscriptConfig, TranscriptEngine};
use mongodb::Database;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub consultations: Arc<ConsultationDao>,
    pub transcripts: Arc<TranscriptEngine>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Result<Self, PolicyParseError> {
        let auth = Arc::new(AuthService::new(settings.auth.clone()));
        let users = Arc::new(UserDao::new(&db));
        let consultations = Arc::new(ConsultationDao::new(&db));
        let transcripts = TranscriptEngine::new(transcript_config(&settings.transcript)?);

        Ok(Self {
            db,
            settings,
            auth,
            users,
            consultations,
            transcripts,
        })
    }
}

pub fn transcript_config(settings: &TranscriptSettings) -> Result<TranscriptConfig, PolicyParseError> {
    Ok(TranscriptConfig::default()
        .with_quiet_period_ms(settings.quiet_period_ms)
        .with_takeover_policy(settings.takeover_policy.parse()?)
        .with_end_policy(settings.end_policy.parse()?))
}
