//! Survey entity model.
//!
//! A [`Survey`] is one field session at a site. It exclusively owns its
//! [`Observation`] and [`Disturbance`] records: replacing a survey rewrites
//! both collections, deleting it discards them.
//!
//! # Identity
//!
//! - `id`: surrogate key assigned by the store on insert.
//! - `survey_identifier`: external UUID issued once at creation. It never
//!   changes and stays the same when a survey moves from pending to completed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of survey being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SurveyType {
    /// Waterbird foraging survey: bins are adults and juveniles.
    Foraging,
    /// Rookery census: bins are adults and bin 3, with nesting flags.
    Rookery,
}

impl SurveyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyType::Foraging => "foraging",
            SurveyType::Rookery => "rookery",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "foraging" => Some(Self::Foraging),
            "rookery" => Some(Self::Rookery),
            _ => None,
        }
    }
}

/// Lifecycle position of a survey.
///
/// A pending survey may be flagged `finished` ("done editing, not yet
/// verified"). `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurveyVariant {
    Pending { finished: bool },
    Completed,
}

impl SurveyVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyVariant::Pending { finished: false } => "pending",
            SurveyVariant::Pending { finished: true } => "finished",
            SurveyVariant::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending { finished: false }),
            "finished" => Some(Self::Pending { finished: true }),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SurveyVariant::Completed)
    }

    /// True once the survey has been marked finished or completed.
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            SurveyVariant::Pending { finished: true } | SurveyVariant::Completed
        )
    }
}

/// One survey session with its nested records.
#[derive(Debug, Clone, PartialEq)]
pub struct Survey {
    pub id: Option<i64>,
    pub survey_identifier: Uuid,
    pub survey_type: SurveyType,
    pub variant: SurveyVariant,

    pub location_id: Option<i32>,
    /// Assessment / site type code.
    pub site_type_id: Option<i32>,
    pub access_point_id: Option<i32>,
    pub vantage_point_id: Option<i32>,
    pub tide_id: Option<i32>,
    pub weather_id: Option<i32>,
    pub water_height_id: Option<i32>,
    pub wind_speed: Option<i32>,
    pub temperature: Option<f64>,

    pub observers: String,
    pub survey_comments: String,
    pub disturbance_comments: String,

    /// Local wall-clock start of the survey.
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,

    /// Id of the authenticated user who last submitted the survey.
    pub submitted_by: String,

    pub observations: Vec<Observation>,
    pub disturbances: Vec<Disturbance>,
}

impl Survey {
    /// An empty pending survey of the given type.
    pub fn new(survey_identifier: Uuid, survey_type: SurveyType) -> Self {
        Self {
            id: None,
            survey_identifier,
            survey_type,
            variant: SurveyVariant::Pending { finished: false },
            location_id: None,
            site_type_id: None,
            access_point_id: None,
            vantage_point_id: None,
            tide_id: None,
            weather_id: None,
            water_height_id: None,
            wind_speed: None,
            temperature: None,
            observers: String::new(),
            survey_comments: String::new(),
            disturbance_comments: String::new(),
            start_date: None,
            end_date: None,
            submitted_by: String::new(),
            observations: Vec::new(),
            disturbances: Vec::new(),
        }
    }
}

/// One species / behavior tally within a survey.
///
/// `bin1` and `bin2` mean adults and juveniles on a foraging survey, and
/// adults and bin 3 on a rookery census.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub survey_identifier: Uuid,
    pub species_id: Option<i32>,
    pub primary_activity_id: Option<i32>,
    pub secondary_activity_id: Option<i32>,
    pub habitat_id: Option<i32>,
    pub feeding_success_id: Option<i32>,
    pub bin1: Option<i32>,
    pub bin2: Option<i32>,
    pub chicks_present: Option<bool>,
    pub nests_present: Option<bool>,
    pub fledglings_present: Option<bool>,
}

/// One disturbance event recorded during a survey.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disturbance {
    pub survey_identifier: Uuid,
    pub disturbance_type_id: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub quantity: Option<i32>,
    /// What the birds did in response.
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_round_trips_through_storage_text() {
        for variant in [
            SurveyVariant::Pending { finished: false },
            SurveyVariant::Pending { finished: true },
            SurveyVariant::Completed,
        ] {
            assert_eq!(SurveyVariant::parse(variant.as_str()), Some(variant));
        }
        assert_eq!(SurveyVariant::parse("archived"), None);
    }

    #[test]
    fn test_variant_flags() {
        assert!(!SurveyVariant::Pending { finished: false }.is_finished());
        assert!(SurveyVariant::Pending { finished: true }.is_finished());
        assert!(!SurveyVariant::Pending { finished: true }.is_completed());
        assert!(SurveyVariant::Completed.is_finished());
        assert!(SurveyVariant::Completed.is_completed());
    }

    #[test]
    fn test_survey_type_text() {
        assert_eq!(SurveyType::parse("foraging"), Some(SurveyType::Foraging));
        assert_eq!(SurveyType::parse("rookery"), Some(SurveyType::Rookery));
        assert_eq!(SurveyType::parse("Foraging"), None);
    }

    #[test]
    fn test_new_survey_is_pending() {
        let survey = Survey::new(Uuid::new_v4(), SurveyType::Rookery);
        assert_eq!(survey.variant, SurveyVariant::Pending { finished: false });
        assert!(survey.id.is_none());
        assert!(survey.observations.is_empty());
    }
}
