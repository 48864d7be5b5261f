use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::content::{group_by_status, BoardColumn, ContentItem, ContentItemInput, ItemStore};
use crate::database::Database;
use crate::editor::{EditorSession, GenerationKind, GenerationOutcome, WorkingDraft};
use crate::gemini::{GatewayConfig, GeminiClient, GenerationGateway};
use crate::settings::{Settings, SettingsView};

pub struct AppState {
    pub db: Arc<Database>,
    pub store: ItemStore,
    pub gateway: Mutex<Arc<GenerationGateway>>,
}

#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<crate::database::DbError> for CommandError {
    fn from(e: crate::database::DbError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<crate::content::StoreError> for CommandError {
    fn from(e: crate::content::StoreError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<crate::editor::SessionError> for CommandError {
    fn from(e: crate::editor::SessionError) -> Self {
        CommandError::new(e.to_string())
    }
}

impl From<crate::gemini::GenerationError> for CommandError {
    fn from(e: crate::gemini::GenerationError) -> Self {
        CommandError::new(e.to_string())
    }
}

pub fn build_gateway(settings: &Settings) -> GenerationGateway {
    let client = GeminiClient::new(
        settings.api_key.clone(),
        Some(settings.base_url.clone()),
        settings.request_timeout(),
    );

    GenerationGateway::new(
        Arc::new(client),
        GatewayConfig {
            text_model: settings.text_model.clone(),
            image_model: settings.image_model.clone(),
            timeout: settings.request_timeout(),
        },
    )
}

impl AppState {
    /// Load settings and items and wire up the Gemini-backed gateway
    pub fn initialize(db: Arc<Database>) -> Result<Self, CommandError> {
        let settings = db.get_settings()?.with_env_overrides();
        tracing::info!(
            api_key_set = settings.has_api_key(),
            text_model = %settings.text_model,
            image_model = %settings.image_model,
            "settings loaded"
        );
        let gateway = Arc::new(build_gateway(&settings));
        Self::with_gateway(db, gateway)
    }

    pub fn with_gateway(
        db: Arc<Database>,
        gateway: Arc<GenerationGateway>,
    ) -> Result<Self, CommandError> {
        let store = ItemStore::open(db.clone())?;
        if !gateway.has_credential() {
            tracing::warn!("no Gemini API key configured; generation commands will fail");
        }
        Ok(Self {
            db,
            store,
            gateway: Mutex::new(gateway),
        })
    }

    async fn session(&self) -> EditorSession {
        let gateway = self.gateway.lock().await.clone();
        EditorSession::new(gateway)
    }

    fn require_item(&self, id: &str) -> Result<ContentItem, CommandError> {
        self.store
            .get(id)?
            .ok_or_else(|| CommandError::new(format!("Content item not found: {}", id)))
    }
}

fn apply_input(draft: &mut WorkingDraft, input: ContentItemInput) {
    if let Some(title) = input.title {
        draft.title = title;
    }
    if let Some(topic) = input.topic {
        draft.topic = topic;
    }
    if let Some(content_type) = input.content_type {
        draft.content_type = content_type;
    }
    if let Some(platform) = input.platform {
        draft.platform = platform;
    }
    if let Some(status) = input.status {
        draft.status = status;
    }
    if let Some(notes) = input.research_notes {
        draft.research_notes = notes;
    }
    if let Some(content) = input.draft_content {
        draft.draft_content = content;
    }
    if let Some(url) = input.thumbnail_url {
        draft.thumbnail_url = Some(url).filter(|u| !u.is_empty());
    }
}

// ==================== Item commands ====================

pub fn list_items(state: &AppState) -> Result<Vec<ContentItem>, CommandError> {
    state.store.list().map_err(Into::into)
}

pub fn get_item(state: &AppState, id: &str) -> Result<Option<ContentItem>, CommandError> {
    state.store.get(id).map_err(Into::into)
}

pub fn get_board(state: &AppState) -> Result<Vec<BoardColumn>, CommandError> {
    Ok(group_by_status(&state.store.list()?))
}

pub async fn create_item(
    state: &AppState,
    input: ContentItemInput,
) -> Result<ContentItem, CommandError> {
    let session = state.session().await;
    session.open_new();
    session.edit(|draft| apply_input(draft, input))?;
    session.commit(&state.store).map_err(Into::into)
}

pub async fn update_item(
    state: &AppState,
    id: &str,
    input: ContentItemInput,
) -> Result<ContentItem, CommandError> {
    let item = state.require_item(id)?;
    let session = state.session().await;
    session.open_existing(&item);
    session.edit(|draft| apply_input(draft, input))?;
    session.commit(&state.store).map_err(Into::into)
}

/// Delete an item. Nothing happens unless the caller confirmed.
pub fn delete_item(state: &AppState, id: &str, confirmed: bool) -> Result<bool, CommandError> {
    if !confirmed {
        return Err(CommandError::new("Deletion requires confirmation"));
    }
    state.store.remove(id).map_err(Into::into)
}

// ==================== Generation commands ====================

async fn generate_for(
    state: &AppState,
    id: &str,
    kind: GenerationKind,
) -> Result<ContentItem, CommandError> {
    let item = state.require_item(id)?;
    let session = state.session().await;
    session.open_existing(&item);

    match session.run(kind).await {
        GenerationOutcome::Applied => session.commit(&state.store).map_err(Into::into),
        GenerationOutcome::Failed(e) => {
            let message = session.error().unwrap_or_else(|| kind.failure_message().to_string());
            session.discard();
            Err(CommandError::new(format!("{} ({})", message, e)))
        }
        GenerationOutcome::Rejected(message) => {
            session.discard();
            Err(CommandError::new(message))
        }
        other => {
            session.discard();
            Err(CommandError::new(format!("Generation did not run: {:?}", other)))
        }
    }
}

pub async fn generate_draft_for(state: &AppState, id: &str) -> Result<ContentItem, CommandError> {
    generate_for(state, id, GenerationKind::Draft).await
}

pub async fn generate_thumbnail_for(
    state: &AppState,
    id: &str,
) -> Result<ContentItem, CommandError> {
    generate_for(state, id, GenerationKind::Thumbnail).await
}

pub async fn suggest_ideas_for(state: &AppState, id: &str) -> Result<ContentItem, CommandError> {
    generate_for(state, id, GenerationKind::Ideas).await
}

// ==================== Settings commands ====================

pub fn get_settings(state: &AppState) -> Result<Settings, CommandError> {
    let settings = state.db.get_settings()?;
    tracing::debug!(api_key_len = settings.api_key.len(), "read settings");
    Ok(settings)
}

/// Settings in effect after environment overrides, key masked
pub fn get_effective_settings(state: &AppState) -> Result<SettingsView, CommandError> {
    Ok(get_settings(state)?.with_env_overrides().into())
}

pub async fn save_settings(state: &AppState, settings: Settings) -> Result<(), CommandError> {
    tracing::info!(
        base_url = %settings.base_url,
        text_model = %settings.text_model,
        api_key_len = settings.api_key.len(),
        "saving settings"
    );
    state.db.save_settings(&settings)?;

    let effective = settings.with_env_overrides();
    *state.gateway.lock().await = Arc::new(build_gateway(&effective));

    Ok(())
}

// ==================== Recovery commands ====================

pub fn list_quarantined(state: &AppState) -> Result<Vec<String>, CommandError> {
    Ok(state.db.list_quarantined_items()?)
}

pub fn show_quarantined(state: &AppState, key: &str) -> Result<String, CommandError> {
    state
        .db
        .get_quarantined_items(key)?
        .ok_or_else(|| CommandError::new(format!("No quarantined data under {}", key)))
}

pub fn delete_quarantined(
    state: &AppState,
    key: &str,
    confirmed: bool,
) -> Result<bool, CommandError> {
    if !confirmed {
        return Err(CommandError::new("Deletion requires confirmation"));
    }
    Ok(state.db.delete_quarantined_items(key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ContentStatus, ContentType, Platform};
    use crate::gemini::{
        GenerationBackend, GenerationError, ImageRequest, InlineImage, TextRequest,
    };
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoBackend {
        credential: bool,
    }

    #[async_trait]
    impl GenerationBackend for EchoBackend {
        fn has_credential(&self) -> bool {
            self.credential
        }

        async fn generate_text(&self, request: TextRequest) -> Result<String, GenerationError> {
            Ok(format!("generated ({} chars of prompt)", request.prompt.len()))
        }

        async fn generate_image(
            &self,
            _request: ImageRequest,
        ) -> Result<Option<InlineImage>, GenerationError> {
            Ok(None)
        }
    }

    fn state(credential: bool) -> AppState {
        state_with_db(credential, Arc::new(Database::open_in_memory().unwrap()))
    }

    fn state_with_db(credential: bool, db: Arc<Database>) -> AppState {
        let gateway = Arc::new(GenerationGateway::new(
            Arc::new(EchoBackend { credential }),
            GatewayConfig {
                text_model: "text".to_string(),
                image_model: "image".to_string(),
                timeout: Duration::from_secs(5),
            },
        ));
        AppState::with_gateway(db, gateway).unwrap()
    }

    fn input(title: &str) -> ContentItemInput {
        ContentItemInput {
            title: Some(title.to_string()),
            topic: Some("Ownership".to_string()),
            content_type: Some(ContentType::Short),
            platform: Some(Platform::Both),
            research_notes: Some("borrowck notes".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_update_and_list() {
        let state = state(true);

        let created = create_item(&state, input("First")).await.unwrap();
        assert_eq!(created.status, ContentStatus::Idea);
        assert_eq!(created.content_type, ContentType::Short);

        let updated = update_item(
            &state,
            &created.id,
            ContentItemInput {
                status: Some(ContentStatus::Drafting),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "First");
        let items = list_items(&state).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, ContentStatus::Drafting);

        let board = get_board(&state).unwrap();
        assert_eq!(board[2].count, 1);
    }

    #[tokio::test]
    async fn test_create_without_title_fails() {
        let state = state(true);
        let result = create_item(&state, ContentItemInput::default()).await;
        assert_eq!(result.unwrap_err().message(), "Title is required");
        assert!(list_items(&state).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let state = state(true);
        let created = create_item(&state, input("Doomed")).await.unwrap();

        assert!(delete_item(&state, &created.id, false).is_err());
        assert_eq!(list_items(&state).unwrap().len(), 1);

        assert!(delete_item(&state, &created.id, true).unwrap());
        assert!(!delete_item(&state, &created.id, true).unwrap());
        assert!(list_items(&state).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generated_draft_is_committed() {
        let state = state(true);
        let created = create_item(&state, input("Draft me")).await.unwrap();

        let item = generate_draft_for(&state, &created.id).await.unwrap();

        assert!(item.draft_content.starts_with("generated"));
        assert_eq!(get_item(&state, &created.id).unwrap().unwrap(), item);
    }

    #[tokio::test]
    async fn test_missing_credential_leaves_item_untouched() {
        let state = state(false);
        let created = create_item(&state, input("No key")).await.unwrap();

        let err = suggest_ideas_for(&state, &created.id).await.unwrap_err();

        assert!(err.message().starts_with("API key not configured."));
        assert_eq!(get_item(&state, &created.id).unwrap().unwrap(), created);
    }

    #[tokio::test]
    async fn test_thumbnail_without_image_reports_failure() {
        let state = state(true);
        let created = create_item(&state, input("Thumb")).await.unwrap();

        let err = generate_thumbnail_for(&state, &created.id).await.unwrap_err();

        assert!(err.message().contains("Failed to generate thumbnail."));
        assert_eq!(get_item(&state, &created.id).unwrap().unwrap().thumbnail_url, None);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let state = state(true);
        assert!(generate_draft_for(&state, "missing").await.is_err());
        assert!(update_item(&state, "missing", ContentItemInput::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_save_settings_persists() {
        let state = state(true);
        let mut settings = get_settings(&state).unwrap();
        settings.text_model = "custom-model".to_string();

        save_settings(&state, settings).await.unwrap();

        assert_eq!(get_settings(&state).unwrap().text_model, "custom-model");
    }

    #[tokio::test]
    async fn test_gateway_reports_missing_credential() {
        assert!(!state(false).gateway.lock().await.has_credential());
        assert!(state(true).gateway.lock().await.has_credential());
    }

    #[test]
    fn test_quarantined_data_is_recoverable() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.kv_set(crate::content::STORAGE_KEY, "[{broken").unwrap();
        let state = state_with_db(true, db);

        assert!(list_items(&state).unwrap().is_empty());
        let keys = list_quarantined(&state).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(show_quarantined(&state, &keys[0]).unwrap(), "[{broken");
        assert!(show_quarantined(&state, "creatorflow-settings").is_err());

        assert!(delete_quarantined(&state, &keys[0], false).is_err());
        assert!(delete_quarantined(&state, &keys[0], true).unwrap());
        assert!(list_quarantined(&state).unwrap().is_empty());
    }
}
