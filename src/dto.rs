//! Wire models exchanged with field clients.
//!
//! JSON keys are PascalCase and are a fixed contract with the client
//! application. Renaming a field here breaks deployed clients.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::SurveyType;

/// Full survey as sent and received by the client.
///
/// Dates and times travel as separate strings because the client edits them
/// independently; see [`crate::mapper::parse_date_time`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SurveyModel {
    pub survey_id: Option<i64>,
    pub survey_identifier: Uuid,
    pub location_id: Option<i32>,
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
    pub start_date: String,
    pub start_time: String,
    pub end_time: String,
    pub completed: bool,
    pub finished: bool,
    pub observations: Vec<ObservationModel>,
    pub disturbances: Vec<DisturbanceModel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObservationModel {
    pub species_id: Option<i32>,
    pub primary_activity_id: Option<i32>,
    pub secondary_activity_id: Option<i32>,
    pub habitat_id: Option<i32>,
    pub feeding_success_id: Option<i32>,
    pub adults: Option<i32>,
    /// Foraging surveys only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub juveniles: Option<i32>,
    /// Rookery census only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin3: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chicks_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nests_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fledglings_present: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DisturbanceModel {
    pub disturbance_type_id: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub quantity: Option<i32>,
    pub result: String,
}

/// Minimal projection for survey listing screens.
///
/// Absent text and dates are rendered as [`MISSING`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SurveySummaryItem {
    pub survey_id: Option<i64>,
    pub survey_identifier: Uuid,
    pub survey_type: SurveyType,
    pub status: String,
    pub location_id: Option<i32>,
    pub start_date: String,
    pub observers: String,
    pub submitted_by: String,
    pub observation_count: usize,
}

/// Full projection of a completed survey for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SurveyExportItem {
    pub survey_type: SurveyType,
    pub submitted_by: String,
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(flatten)]
    pub survey: SurveyModel,
}

/// Placeholder shown in listings for fields the observer left blank.
pub const MISSING: &str = "missing";
