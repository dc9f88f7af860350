//! HTTP API handlers for the survey service.
//!
//! Each survey type is served under its own base path:
//!
//! - `/waterbirdforagingsurvey` (also `/WaterbirdForagingSurvey`)
//! - `/rookerycensussurvey` (also `/RookeryCensusSurvey`)
//!
//! Handlers only validate identifiers, pick a lifecycle transition, and map
//! between wire models and entities. All state changes go through
//! [`SurveyManager`].
//!
//! # Authentication
//!
//! Callers are authenticated upstream. The identity provider forwards the
//! user id in the [`USER_HEADER`] header; requests without it get `401`.

use axum::{
    Extension, Json, Router, async_trait,
    extract::{FromRequestParts, Path, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dto::{SurveyExportItem, SurveyModel, SurveySummaryItem};
use crate::error::SurveyError;
use crate::manager::SurveyManager;
use crate::mapper::{entity_to_model, model_to_completed_entity, model_to_pending_entity};
use crate::model::{SurveyType, SurveyVariant};

/// Header carrying the authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: SurveyManager,
}

/// The authenticated user making the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(|user_id| Caller {
                user_id: user_id.to_string(),
            })
            .ok_or((StatusCode::UNAUTHORIZED, "authentication required"))
    }
}

/// What a PUT does with the incoming model.
///
/// `Completed` takes precedence when both flags are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutTransition {
    /// Save edits, stay pending.
    Update,
    /// Done editing, not yet verified.
    Finish,
    /// Promote to completed.
    Complete,
}

impl PutTransition {
    pub fn from_flags(completed: bool, finished: bool) -> Self {
        if completed {
            PutTransition::Complete
        } else if finished {
            PutTransition::Finish
        } else {
            PutTransition::Update
        }
    }
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new().route("/health", get(health_check));

    for survey_type in [SurveyType::Foraging, SurveyType::Rookery] {
        for path in route_paths(survey_type) {
            app = app.nest(path, survey_routes(survey_type));
        }
    }

    app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Canonical base path for a survey type.
pub fn base_path(survey_type: SurveyType) -> &'static str {
    match survey_type {
        SurveyType::Foraging => "/waterbirdforagingsurvey",
        SurveyType::Rookery => "/rookerycensussurvey",
    }
}

// Field clients use both spellings.
fn route_paths(survey_type: SurveyType) -> [&'static str; 2] {
    match survey_type {
        SurveyType::Foraging => ["/waterbirdforagingsurvey", "/WaterbirdForagingSurvey"],
        SurveyType::Rookery => ["/rookerycensussurvey", "/RookeryCensusSurvey"],
    }
}

fn survey_routes(survey_type: SurveyType) -> Router<AppState> {
    Router::new()
        .route("/", get(list_surveys).post(create_survey))
        .route("/export", get(export_surveys))
        .route("/user/:user_id", get(get_surveys_for_user))
        .route("/:survey_identifier", get(get_survey).put(update_survey))
        .layer(Extension(survey_type))
}

/// GET /{base}/{guid} - Fetch one survey.
///
/// Returns `404` when no survey of this type has the identifier.
#[instrument(skip(state))]
pub async fn get_survey(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
    Path(survey_identifier): Path<Uuid>,
) -> Result<Json<SurveyModel>, SurveyError> {
    if survey_identifier.is_nil() {
        warn!("Empty survey identifier");
        return Err(SurveyError::validation("survey identifier is required"));
    }

    let survey = state
        .manager
        .find_by_survey_id(survey_identifier)
        .await?
        .filter(|survey| survey.survey_type == survey_type)
        .ok_or(SurveyError::NotFound(survey_identifier))?;

    Ok(Json(entity_to_model(&survey)))
}

/// GET /{base}/user/{userId} - All surveys a user submitted.
///
/// A user with no surveys gets `200` and an empty list.
#[instrument(skip(state))]
pub async fn get_surveys_for_user(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<SurveyModel>>, SurveyError> {
    let surveys = state.manager.find_by_submitter_id(&user_id).await?;

    let models: Vec<SurveyModel> = surveys
        .iter()
        .filter(|survey| survey.survey_type == survey_type)
        .map(entity_to_model)
        .collect();

    info!(count = models.len(), "User surveys queried");
    Ok(Json(models))
}

/// GET /{base} - Summary listing of pending and completed surveys.
#[instrument(skip(state))]
pub async fn list_surveys(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
) -> Result<Json<Vec<SurveySummaryItem>>, SurveyError> {
    let items = match survey_type {
        SurveyType::Foraging => state.manager.get_foraging_survey_list().await?,
        other => state.manager.survey_list(other).await?,
    };

    info!(count = items.len(), "Survey list queried");
    Ok(Json(items))
}

/// GET /{base}/export - Completed surveys for reporting.
#[instrument(skip(state))]
pub async fn export_surveys(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
) -> Result<Json<Vec<SurveyExportItem>>, SurveyError> {
    let items = state.manager.export_all(survey_type).await?;

    info!(count = items.len(), "Survey export queried");
    Ok(Json(items))
}

/// POST /{base} - Create a pending survey.
///
/// The server issues the identifier; any `SurveyIdentifier` in the body is
/// ignored. Returns `201` with the created model and a `Location` header.
#[instrument(skip(state, body))]
pub async fn create_survey(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
    body: Option<Json<SurveyModel>>,
) -> Result<impl IntoResponse, SurveyError> {
    let Some(Json(model)) = body else {
        warn!("Survey body missing");
        return Err(SurveyError::validation("request body is required"));
    };

    let identifier = state.manager.new_identifier();
    let mut entity = model_to_pending_entity(&model, identifier, &caller.user_id, survey_type);
    // New surveys always start out as plain pending.
    entity.variant = SurveyVariant::Pending { finished: false };

    let created = state.manager.create(entity).await?;
    let location = format!("{}/{}", base_path(survey_type), created.survey_identifier);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(entity_to_model(&created)),
    ))
}

/// PUT /{base}/{guid} - Update, finish, or complete a survey.
///
/// | `Completed` | `Finished` | effect                    |
/// |-------------|------------|---------------------------|
/// | true        | any        | stored as completed       |
/// | false       | true       | pending, flagged finished |
/// | false       | false      | pending                   |
#[instrument(skip(state, body))]
pub async fn update_survey(
    State(state): State<AppState>,
    Extension(survey_type): Extension<SurveyType>,
    caller: Caller,
    Path(survey_identifier): Path<Uuid>,
    body: Option<Json<SurveyModel>>,
) -> Result<Json<SurveyModel>, SurveyError> {
    if survey_identifier.is_nil() {
        warn!("Empty survey identifier");
        return Err(SurveyError::validation("survey identifier is required"));
    }
    let Some(Json(model)) = body else {
        warn!("Survey body missing");
        return Err(SurveyError::validation("request body is required"));
    };

    let transition = PutTransition::from_flags(model.completed, model.finished);
    let user_id = caller.user_id.as_str();

    let updated = match transition {
        PutTransition::Complete => {
            let entity = model_to_completed_entity(&model, survey_identifier, user_id, survey_type);
            state.manager.update(entity).await?
        }
        PutTransition::Finish => {
            let entity = model_to_pending_entity(&model, survey_identifier, user_id, survey_type);
            state.manager.finish(entity).await?
        }
        PutTransition::Update => {
            let entity = model_to_pending_entity(&model, survey_identifier, user_id, survey_type);
            state.manager.update(entity).await?
        }
    };

    info!(?transition, status = updated.variant.as_str(), "Survey saved");
    Ok(Json(entity_to_model(&updated)))
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
