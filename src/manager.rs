//! Survey lifecycle orchestration.
//!
//! [`SurveyManager`] is the only code path that mutates survey state. It
//! issues identifiers, enforces the pending -> finished -> completed
//! lifecycle, and hands persistence to an injected [`SurveyStore`].
//!
//! # Lifecycle
//!
//! - A survey is created pending.
//! - `update` persists edits in whatever shape the caller built (pending or
//!   completed).
//! - `finish` flags a pending survey as done editing.
//! - Completed is terminal: pending-shaped writes against a completed survey
//!   are rejected.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::dto::{SurveyExportItem, SurveySummaryItem};
use crate::error::{SurveyError, SurveyResult};
use crate::mapper::{entity_to_export, entity_to_summary};
use crate::model::{Survey, SurveyType, SurveyVariant};
use crate::storage::SurveyStore;

#[derive(Clone)]
pub struct SurveyManager {
    store: Arc<dyn SurveyStore>,
}

impl SurveyManager {
    pub fn new(store: Arc<dyn SurveyStore>) -> Self {
        Self { store }
    }

    /// Issue a fresh survey identifier. Only used at creation time.
    pub fn new_identifier(&self) -> Uuid {
        Uuid::new_v4()
    }

    /// Persist a new pending survey.
    pub async fn create(&self, mut survey: Survey) -> SurveyResult<Survey> {
        validate(&survey)?;
        if survey.variant.is_completed() {
            return Err(SurveyError::validation(
                "a new survey cannot start out completed",
            ));
        }

        let id = self.store.insert(&survey).await?;
        survey.id = Some(id);

        info!(
            survey_identifier = %survey.survey_identifier,
            survey_type = survey.survey_type.as_str(),
            id,
            "Survey created"
        );
        Ok(survey)
    }

    /// Look a survey up by its external identifier.
    pub async fn find_by_survey_id(&self, identifier: Uuid) -> SurveyResult<Option<Survey>> {
        self.store.fetch_by_identifier(identifier).await
    }

    /// All surveys submitted by `user_id`, oldest first. Empty when none.
    pub async fn find_by_submitter_id(&self, user_id: &str) -> SurveyResult<Vec<Survey>> {
        self.store.fetch_by_submitter(user_id).await
    }

    /// Persist changes to an existing survey, keyed by `survey_identifier`.
    pub async fn update(&self, mut survey: Survey) -> SurveyResult<Survey> {
        validate(&survey)?;

        let existing = self
            .store
            .fetch_by_identifier(survey.survey_identifier)
            .await?
            .ok_or(SurveyError::NotFound(survey.survey_identifier))?;

        if existing.survey_type != survey.survey_type {
            return Err(SurveyError::validation(format!(
                "survey {} is a {} survey",
                survey.survey_identifier,
                existing.survey_type.as_str()
            )));
        }
        if existing.variant.is_completed() && !survey.variant.is_completed() {
            return Err(SurveyError::validation(format!(
                "survey {} is already completed",
                survey.survey_identifier
            )));
        }

        let id = self
            .store
            .replace(&survey)
            .await?
            .ok_or(SurveyError::NotFound(survey.survey_identifier))?;
        survey.id = Some(id);

        info!(
            survey_identifier = %survey.survey_identifier,
            status = survey.variant.as_str(),
            observations = survey.observations.len(),
            disturbances = survey.disturbances.len(),
            "Survey updated"
        );
        Ok(survey)
    }

    /// Mark a pending survey as finished without promoting it to completed.
    pub async fn finish(&self, mut survey: Survey) -> SurveyResult<Survey> {
        if survey.variant.is_completed() {
            return Err(SurveyError::validation(
                "finish applies to pending surveys only",
            ));
        }
        survey.variant = SurveyVariant::Pending { finished: true };
        self.update(survey).await
    }

    /// Listing of all foraging surveys, pending and completed.
    pub async fn get_foraging_survey_list(&self) -> SurveyResult<Vec<SurveySummaryItem>> {
        self.survey_list(SurveyType::Foraging).await
    }

    /// Listing of all surveys of one type, pending and completed.
    pub async fn survey_list(&self, survey_type: SurveyType) -> SurveyResult<Vec<SurveySummaryItem>> {
        let surveys = self.store.fetch_by_type(survey_type, false).await?;
        debug!(
            survey_type = survey_type.as_str(),
            count = surveys.len(),
            "Survey list loaded"
        );
        Ok(surveys.iter().map(entity_to_summary).collect())
    }

    /// Full projection of every completed survey of one type.
    pub async fn export_all(&self, survey_type: SurveyType) -> SurveyResult<Vec<SurveyExportItem>> {
        let surveys = self.store.fetch_by_type(survey_type, true).await?;
        debug!(
            survey_type = survey_type.as_str(),
            count = surveys.len(),
            "Survey export loaded"
        );
        Ok(surveys.iter().map(entity_to_export).collect())
    }
}

fn validate(survey: &Survey) -> SurveyResult<()> {
    if survey.survey_identifier.is_nil() {
        return Err(SurveyError::validation("survey identifier is required"));
    }
    if survey.submitted_by.trim().is_empty() {
        return Err(SurveyError::validation("submitting user is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Observation;
    use crate::storage::Storage;

    async fn memory_manager() -> SurveyManager {
        let storage = Storage::new("sqlite::memory:", 5).await.unwrap();
        SurveyManager::new(Arc::new(storage))
    }

    fn pending_survey(manager: &SurveyManager, survey_type: SurveyType) -> Survey {
        let mut survey = Survey::new(manager.new_identifier(), survey_type);
        survey.submitted_by = "observer-1".to_string();
        survey.observers = "AB".to_string();
        survey
    }

    #[test]
    fn test_new_identifier_is_unique() {
        let store: Arc<dyn SurveyStore> = Arc::new(NoStore);
        let manager = SurveyManager::new(store);

        let first = manager.new_identifier();
        let second = manager.new_identifier();

        assert!(!first.is_nil());
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_create_assigns_id() {
        let manager = memory_manager().await;
        let survey = pending_survey(&manager, SurveyType::Foraging);

        let created = manager.create(survey.clone()).await.unwrap();

        assert!(created.id.is_some());
        let found = manager
            .find_by_survey_id(survey.survey_identifier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn test_create_requires_submitter() {
        let manager = memory_manager().await;
        let mut survey = pending_survey(&manager, SurveyType::Foraging);
        survey.submitted_by.clear();

        let err = manager.create(survey).await.unwrap_err();

        assert!(matches!(err, SurveyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_find_missing_survey_is_none() {
        let manager = memory_manager().await;

        let found = manager.find_by_survey_id(Uuid::new_v4()).await.unwrap();

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_by_submitter_without_surveys_is_empty() {
        let manager = memory_manager().await;

        let surveys = manager.find_by_submitter_id("nobody").await.unwrap();

        assert!(surveys.is_empty());
    }

    #[tokio::test]
    async fn test_update_unknown_survey_is_not_found() {
        let manager = memory_manager().await;
        let survey = pending_survey(&manager, SurveyType::Foraging);
        let identifier = survey.survey_identifier;

        let err = manager.update(survey).await.unwrap_err();

        assert!(matches!(err, SurveyError::NotFound(id) if id == identifier));
    }

    #[tokio::test]
    async fn test_update_replaces_observations() {
        let manager = memory_manager().await;
        let mut survey = pending_survey(&manager, SurveyType::Foraging);
        manager.create(survey.clone()).await.unwrap();

        survey.observations.push(Observation {
            survey_identifier: survey.survey_identifier,
            species_id: Some(42),
            bin1: Some(3),
            ..Observation::default()
        });
        let updated = manager.update(survey.clone()).await.unwrap();

        let found = manager
            .find_by_survey_id(survey.survey_identifier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.observations.len(), 1);
        assert_eq!(found.id, updated.id);
    }

    #[tokio::test]
    async fn test_finish_keeps_survey_pending() {
        let manager = memory_manager().await;
        let survey = pending_survey(&manager, SurveyType::Foraging);
        manager.create(survey.clone()).await.unwrap();

        let finished = manager.finish(survey).await.unwrap();

        assert_eq!(finished.variant, SurveyVariant::Pending { finished: true });
        assert!(!finished.variant.is_completed());
    }

    #[tokio::test]
    async fn test_completed_is_terminal() {
        let manager = memory_manager().await;
        let mut survey = pending_survey(&manager, SurveyType::Foraging);
        manager.create(survey.clone()).await.unwrap();

        survey.variant = SurveyVariant::Completed;
        manager.update(survey.clone()).await.unwrap();

        survey.variant = SurveyVariant::Pending { finished: false };
        let err = manager.update(survey.clone()).await.unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));

        let err = manager.finish(survey.clone()).await.unwrap_err();
        assert!(matches!(err, SurveyError::Validation(_)));

        // Completed surveys can still be corrected.
        survey.variant = SurveyVariant::Completed;
        survey.observers = "AB, CD".to_string();
        let corrected = manager.update(survey).await.unwrap();
        assert_eq!(corrected.observers, "AB, CD");
    }

    #[tokio::test]
    async fn test_list_and_export() {
        let manager = memory_manager().await;

        let pending = pending_survey(&manager, SurveyType::Foraging);
        manager.create(pending).await.unwrap();

        let mut completed = pending_survey(&manager, SurveyType::Foraging);
        manager.create(completed.clone()).await.unwrap();
        completed.variant = SurveyVariant::Completed;
        manager.update(completed.clone()).await.unwrap();

        let rookery = pending_survey(&manager, SurveyType::Rookery);
        manager.create(rookery).await.unwrap();

        let list = manager.get_foraging_survey_list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|item| item.survey_type == SurveyType::Foraging));

        let export = manager.export_all(SurveyType::Foraging).await.unwrap();
        assert_eq!(export.len(), 1);
        assert_eq!(
            export[0].survey.survey_identifier,
            completed.survey_identifier
        );
        assert!(export[0].survey.completed);
    }

    /// Store for tests that never reach persistence.
    struct NoStore;

    #[async_trait::async_trait]
    impl SurveyStore for NoStore {
        async fn insert(&self, _survey: &Survey) -> SurveyResult<i64> {
            unreachable!()
        }

        async fn fetch_by_identifier(&self, _identifier: Uuid) -> SurveyResult<Option<Survey>> {
            unreachable!()
        }

        async fn fetch_by_submitter(&self, _submitted_by: &str) -> SurveyResult<Vec<Survey>> {
            unreachable!()
        }

        async fn fetch_by_type(
            &self,
            _survey_type: SurveyType,
            _completed_only: bool,
        ) -> SurveyResult<Vec<Survey>> {
            unreachable!()
        }

        async fn replace(&self, _survey: &Survey) -> SurveyResult<Option<i64>> {
            unreachable!()
        }
    }
}
