//! Translation between wire models and survey entities.
//!
//! All format quirks of the client live here: split date/time strings,
//! per-survey-type bin names, and the listing placeholders. Mapping never
//! fails. A date or time the client sent in a shape we cannot read becomes
//! `None` instead of rejecting the whole survey.

use chrono::{DateTime, NaiveDateTime};
use uuid::Uuid;

use crate::dto::{
    DisturbanceModel, MISSING, ObservationModel, SurveyExportItem, SurveyModel,
    SurveySummaryItem,
};
use crate::model::{Disturbance, Observation, Survey, SurveyType, SurveyVariant};

/// Short date as shown on the client, e.g. `5/1/2020`.
const SHORT_DATE: &str = "%-m/%-d/%Y";

/// Short time as shown on the client, e.g. `2:30 PM`.
const SHORT_TIME: &str = "%-I:%M %p";

/// Timestamp layout used in exports.
const EXPORT_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

/// Layouts accepted after the date and time strings have been joined.
///
/// 24-hour and ISO times are joined with `T`, 12-hour times with a space.
const JOINED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%YT%H:%M:%S%.f",
    "%m/%d/%YT%H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
];

/// Build a survey wire model from an entity.
///
/// `StartDate` and `StartTime` both come from the entity's start timestamp,
/// `EndTime` from its end timestamp. Missing timestamps become empty strings.
pub fn entity_to_model(survey: &Survey) -> SurveyModel {
    SurveyModel {
        survey_id: survey.id,
        survey_identifier: survey.survey_identifier,
        location_id: survey.location_id,
        site_type_id: survey.site_type_id,
        access_point_id: survey.access_point_id,
        vantage_point_id: survey.vantage_point_id,
        tide_id: survey.tide_id,
        weather_id: survey.weather_id,
        water_height_id: survey.water_height_id,
        wind_speed: survey.wind_speed,
        temperature: survey.temperature,
        observers: survey.observers.clone(),
        survey_comments: survey.survey_comments.clone(),
        disturbance_comments: survey.disturbance_comments.clone(),
        start_date: format_or_empty(survey.start_date, SHORT_DATE),
        start_time: format_or_empty(survey.start_date, SHORT_TIME),
        end_time: format_or_empty(survey.end_date, SHORT_TIME),
        completed: survey.variant.is_completed(),
        finished: survey.variant.is_finished(),
        observations: survey
            .observations
            .iter()
            .map(|observation| observation_to_model(observation, survey.survey_type))
            .collect(),
        disturbances: survey.disturbances.iter().map(disturbance_to_model).collect(),
    }
}

/// Build a pending survey entity from a wire model.
///
/// The survey and all of its children take `identifier`, regardless of what
/// the client put in `SurveyIdentifier`. The model's `Finished` flag carries
/// over; `Completed` is ignored.
pub fn model_to_pending_entity(
    model: &SurveyModel,
    identifier: Uuid,
    submitted_by: &str,
    survey_type: SurveyType,
) -> Survey {
    let variant = SurveyVariant::Pending {
        finished: model.finished,
    };
    model_to_entity(model, identifier, submitted_by, survey_type, variant)
}

/// Build a completed survey entity from a wire model.
pub fn model_to_completed_entity(
    model: &SurveyModel,
    identifier: Uuid,
    submitted_by: &str,
    survey_type: SurveyType,
) -> Survey {
    model_to_entity(
        model,
        identifier,
        submitted_by,
        survey_type,
        SurveyVariant::Completed,
    )
}

fn model_to_entity(
    model: &SurveyModel,
    identifier: Uuid,
    submitted_by: &str,
    survey_type: SurveyType,
    variant: SurveyVariant,
) -> Survey {
    Survey {
        id: None,
        survey_identifier: identifier,
        survey_type,
        variant,
        location_id: model.location_id,
        site_type_id: model.site_type_id,
        access_point_id: model.access_point_id,
        vantage_point_id: model.vantage_point_id,
        tide_id: model.tide_id,
        weather_id: model.weather_id,
        water_height_id: model.water_height_id,
        wind_speed: model.wind_speed,
        temperature: model.temperature,
        observers: model.observers.clone(),
        survey_comments: model.survey_comments.clone(),
        disturbance_comments: model.disturbance_comments.clone(),
        start_date: parse_date_time(&model.start_date, &model.start_time),
        end_date: parse_date_time(&model.start_date, &model.end_time),
        submitted_by: submitted_by.to_string(),
        observations: model
            .observations
            .iter()
            .map(|observation| model_to_observation(observation, identifier, survey_type))
            .collect(),
        disturbances: model
            .disturbances
            .iter()
            .map(|disturbance| model_to_disturbance(disturbance, identifier))
            .collect(),
    }
}

fn observation_to_model(observation: &Observation, survey_type: SurveyType) -> ObservationModel {
    let (juveniles, bin3) = match survey_type {
        SurveyType::Foraging => (observation.bin2, None),
        SurveyType::Rookery => (None, observation.bin2),
    };

    ObservationModel {
        species_id: observation.species_id,
        primary_activity_id: observation.primary_activity_id,
        secondary_activity_id: observation.secondary_activity_id,
        habitat_id: observation.habitat_id,
        feeding_success_id: observation.feeding_success_id,
        adults: observation.bin1,
        juveniles,
        bin3,
        chicks_present: observation.chicks_present,
        nests_present: observation.nests_present,
        fledglings_present: observation.fledglings_present,
    }
}

fn model_to_observation(
    model: &ObservationModel,
    identifier: Uuid,
    survey_type: SurveyType,
) -> Observation {
    let bin2 = match survey_type {
        SurveyType::Foraging => model.juveniles,
        SurveyType::Rookery => model.bin3,
    };

    Observation {
        survey_identifier: identifier,
        species_id: model.species_id,
        primary_activity_id: model.primary_activity_id,
        secondary_activity_id: model.secondary_activity_id,
        habitat_id: model.habitat_id,
        feeding_success_id: model.feeding_success_id,
        bin1: model.adults,
        bin2,
        chicks_present: model.chicks_present,
        nests_present: model.nests_present,
        fledglings_present: model.fledglings_present,
    }
}

fn disturbance_to_model(disturbance: &Disturbance) -> DisturbanceModel {
    DisturbanceModel {
        disturbance_type_id: disturbance.disturbance_type_id,
        duration_minutes: disturbance.duration_minutes,
        quantity: disturbance.quantity,
        result: disturbance.result.clone(),
    }
}

fn model_to_disturbance(model: &DisturbanceModel, identifier: Uuid) -> Disturbance {
    Disturbance {
        survey_identifier: identifier,
        disturbance_type_id: model.disturbance_type_id,
        duration_minutes: model.duration_minutes,
        quantity: model.quantity,
        result: model.result.clone(),
    }
}

/// Listing projection of a survey.
pub fn entity_to_summary(survey: &Survey) -> SurveySummaryItem {
    SurveySummaryItem {
        survey_id: survey.id,
        survey_identifier: survey.survey_identifier,
        survey_type: survey.survey_type,
        status: survey.variant.as_str().to_string(),
        location_id: survey.location_id,
        start_date: survey
            .start_date
            .map(|start| start.format(SHORT_DATE).to_string())
            .unwrap_or_else(|| MISSING.to_string()),
        observers: or_missing(&survey.observers),
        submitted_by: or_missing(&survey.submitted_by),
        observation_count: survey.observations.len(),
    }
}

/// Reporting projection of a survey.
pub fn entity_to_export(survey: &Survey) -> SurveyExportItem {
    SurveyExportItem {
        survey_type: survey.survey_type,
        submitted_by: survey.submitted_by.clone(),
        start: survey
            .start_date
            .map(|start| start.format(EXPORT_TIMESTAMP).to_string()),
        end: survey
            .end_date
            .map(|end| end.format(EXPORT_TIMESTAMP).to_string()),
        survey: entity_to_model(survey),
    }
}

/// Rebuild a timestamp from separately edited date and time strings.
///
/// Either string may arrive in ISO combined form (`2020-05-01T14:30:00`); in
/// that case only the date half of `date` and the time half of `time` are
/// used. A time carrying an AM/PM marker is joined to the date with a space,
/// any other time with `T`.
///
/// Returns `None` when the joined string matches no known layout.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use waterbird_survey::mapper::parse_date_time;
///
/// let expected = NaiveDate::from_ymd_opt(2020, 5, 1)
///     .unwrap()
///     .and_hms_opt(14, 30, 0)
///     .unwrap();
/// assert_eq!(parse_date_time("5/1/2020", "2:30 PM"), Some(expected));
/// assert_eq!(parse_date_time("not-a-date", ""), None);
/// ```
pub fn parse_date_time(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let time = time.trim();

    let date = date.split_once('T').map_or(date, |(date_part, _)| date_part);
    let time = time.split_once('T').map_or(time, |(_, time_part)| time_part);

    let joined = if time.contains(['M', 'm']) {
        format!("{date} {time}")
    } else {
        format!("{date}T{time}")
    };

    parse_joined(&joined)
}

fn parse_joined(value: &str) -> Option<NaiveDateTime> {
    // Times sent with an offset, e.g. `14:30:00Z`.
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.naive_local());
    }

    JOINED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

fn format_or_empty(timestamp: Option<NaiveDateTime>, format: &str) -> String {
    timestamp
        .map(|value| value.format(format).to_string())
        .unwrap_or_default()
}

fn or_missing(value: &str) -> String {
    if value.trim().is_empty() {
        MISSING.to_string()
    } else {
        value.to_string()
    }
}
