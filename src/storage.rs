//! SQLite storage layer for surveys.
//!
//! The schema has three tables. `surveys` holds one row per survey keyed by
//! the surrogate `id` and the unique `survey_identifier`. `observations` and
//! `disturbances` reference their survey by `survey_identifier` and keep a
//! `position` column so the client's ordering survives a reload.
//!
//! Multi-table writes run inside one transaction, so a survey is never
//! visible with a partial set of children.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{SurveyError, SurveyResult};
use crate::model::{Disturbance, Observation, Survey, SurveyType, SurveyVariant};

const SURVEY_COLUMNS: &str = "id, survey_identifier, survey_type, status, location_id, \
     site_type_id, access_point_id, vantage_point_id, tide_id, weather_id, water_height_id, \
     wind_speed, temperature, observers, survey_comments, disturbance_comments, start_date, \
     end_date, submitted_by";

/// Persistence operations the survey manager depends on.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    /// Insert a new survey with its children and return the assigned id.
    async fn insert(&self, survey: &Survey) -> SurveyResult<i64>;

    async fn fetch_by_identifier(&self, identifier: Uuid) -> SurveyResult<Option<Survey>>;

    async fn fetch_by_submitter(&self, submitted_by: &str) -> SurveyResult<Vec<Survey>>;

    async fn fetch_by_type(
        &self,
        survey_type: SurveyType,
        completed_only: bool,
    ) -> SurveyResult<Vec<Survey>>;

    /// Overwrite the survey matching `survey.survey_identifier`, replacing all
    /// of its children. Returns `None` when no such survey exists.
    async fn replace(&self, survey: &Survey) -> SurveyResult<Option<i64>>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:waterbird.db" or "sqlite::memory:")
    /// * `max_connections` - Upper bound on pooled connections
    pub async fn new(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS surveys (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                survey_identifier BLOB NOT NULL UNIQUE,
                survey_type TEXT NOT NULL,
                status TEXT NOT NULL,
                location_id INTEGER,
                site_type_id INTEGER,
                access_point_id INTEGER,
                vantage_point_id INTEGER,
                tide_id INTEGER,
                weather_id INTEGER,
                water_height_id INTEGER,
                wind_speed INTEGER,
                temperature REAL,
                observers TEXT NOT NULL,
                survey_comments TEXT NOT NULL,
                disturbance_comments TEXT NOT NULL,
                start_date DATETIME,
                end_date DATETIME,
                submitted_by TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                survey_identifier BLOB NOT NULL
                    REFERENCES surveys(survey_identifier) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                species_id INTEGER,
                primary_activity_id INTEGER,
                secondary_activity_id INTEGER,
                habitat_id INTEGER,
                feeding_success_id INTEGER,
                bin1 INTEGER,
                bin2 INTEGER,
                chicks_present BOOLEAN,
                nests_present BOOLEAN,
                fledglings_present BOOLEAN
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS disturbances (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                survey_identifier BLOB NOT NULL
                    REFERENCES surveys(survey_identifier) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                disturbance_type_id INTEGER,
                duration_minutes INTEGER,
                quantity INTEGER,
                result TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Listing and per-user lookups
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_surveys_type_status
            ON surveys(survey_type, status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_surveys_submitted_by
            ON surveys(submitted_by)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Decode survey rows and attach their children.
    async fn hydrate(&self, rows: &[SqliteRow]) -> SurveyResult<Vec<Survey>> {
        let mut surveys = Vec::with_capacity(rows.len());
        for row in rows {
            let mut survey = survey_from_row(row)?;
            self.load_children(&mut survey).await?;
            surveys.push(survey);
        }
        Ok(surveys)
    }

    async fn load_children(&self, survey: &mut Survey) -> SurveyResult<()> {
        let observation_rows = sqlx::query(
            r#"
            SELECT survey_identifier, species_id, primary_activity_id, secondary_activity_id,
                   habitat_id, feeding_success_id, bin1, bin2,
                   chicks_present, nests_present, fledglings_present
            FROM observations
            WHERE survey_identifier = ?
            ORDER BY position
            "#,
        )
        .bind(survey.survey_identifier)
        .fetch_all(&self.pool)
        .await?;

        survey.observations = observation_rows
            .iter()
            .map(observation_from_row)
            .collect::<Result<_, _>>()?;

        let disturbance_rows = sqlx::query(
            r#"
            SELECT survey_identifier, disturbance_type_id, duration_minutes, quantity, result
            FROM disturbances
            WHERE survey_identifier = ?
            ORDER BY position
            "#,
        )
        .bind(survey.survey_identifier)
        .fetch_all(&self.pool)
        .await?;

        survey.disturbances = disturbance_rows
            .iter()
            .map(disturbance_from_row)
            .collect::<Result<_, _>>()?;

        Ok(())
    }
}

#[async_trait]
impl SurveyStore for Storage {
    async fn insert(&self, survey: &Survey) -> SurveyResult<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO surveys (
                survey_identifier, survey_type, status, location_id, site_type_id,
                access_point_id, vantage_point_id, tide_id, weather_id, water_height_id,
                wind_speed, temperature, observers, survey_comments, disturbance_comments,
                start_date, end_date, submitted_by
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(survey.survey_identifier)
        .bind(survey.survey_type.as_str())
        .bind(survey.variant.as_str())
        .bind(survey.location_id)
        .bind(survey.site_type_id)
        .bind(survey.access_point_id)
        .bind(survey.vantage_point_id)
        .bind(survey.tide_id)
        .bind(survey.weather_id)
        .bind(survey.water_height_id)
        .bind(survey.wind_speed)
        .bind(survey.temperature)
        .bind(&survey.observers)
        .bind(&survey.survey_comments)
        .bind(&survey.disturbance_comments)
        .bind(survey.start_date)
        .bind(survey.end_date)
        .bind(&survey.submitted_by)
        .execute(&mut *tx)
        .await
        .map_err(|e| insert_error(e, survey.survey_identifier))?;

        insert_children(&mut tx, survey).await?;
        tx.commit().await?;

        Ok(result.last_insert_rowid())
    }

    async fn fetch_by_identifier(&self, identifier: Uuid) -> SurveyResult<Option<Survey>> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_identifier = ?");
        let rows = sqlx::query(&sql)
            .bind(identifier)
            .fetch_all(&self.pool)
            .await?;

        Ok(self.hydrate(&rows).await?.into_iter().next())
    }

    async fn fetch_by_submitter(&self, submitted_by: &str) -> SurveyResult<Vec<Survey>> {
        let sql = format!("SELECT {SURVEY_COLUMNS} FROM surveys WHERE submitted_by = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(submitted_by)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(&rows).await
    }

    async fn fetch_by_type(
        &self,
        survey_type: SurveyType,
        completed_only: bool,
    ) -> SurveyResult<Vec<Survey>> {
        let filter = if completed_only {
            "AND status = 'completed'"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {SURVEY_COLUMNS} FROM surveys WHERE survey_type = ? {filter} ORDER BY id"
        );
        let rows = sqlx::query(&sql)
            .bind(survey_type.as_str())
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(&rows).await
    }

    async fn replace(&self, survey: &Survey) -> SurveyResult<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE surveys SET
                survey_type = ?, status = ?, location_id = ?, site_type_id = ?,
                access_point_id = ?, vantage_point_id = ?, tide_id = ?, weather_id = ?,
                water_height_id = ?, wind_speed = ?, temperature = ?, observers = ?,
                survey_comments = ?, disturbance_comments = ?, start_date = ?, end_date = ?,
                submitted_by = ?
            WHERE survey_identifier = ?
            "#,
        )
        .bind(survey.survey_type.as_str())
        .bind(survey.variant.as_str())
        .bind(survey.location_id)
        .bind(survey.site_type_id)
        .bind(survey.access_point_id)
        .bind(survey.vantage_point_id)
        .bind(survey.tide_id)
        .bind(survey.weather_id)
        .bind(survey.water_height_id)
        .bind(survey.wind_speed)
        .bind(survey.temperature)
        .bind(&survey.observers)
        .bind(&survey.survey_comments)
        .bind(&survey.disturbance_comments)
        .bind(survey.start_date)
        .bind(survey.end_date)
        .bind(&survey.submitted_by)
        .bind(survey.survey_identifier)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls it back.
            return Ok(None);
        }

        sqlx::query("DELETE FROM observations WHERE survey_identifier = ?")
            .bind(survey.survey_identifier)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM disturbances WHERE survey_identifier = ?")
            .bind(survey.survey_identifier)
            .execute(&mut *tx)
            .await?;

        insert_children(&mut tx, survey).await?;

        let id: i64 = sqlx::query_scalar("SELECT id FROM surveys WHERE survey_identifier = ?")
            .bind(survey.survey_identifier)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(id))
    }
}

async fn insert_children(conn: &mut SqliteConnection, survey: &Survey) -> SurveyResult<()> {
    for (position, observation) in survey.observations.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO observations (
                survey_identifier, position, species_id, primary_activity_id,
                secondary_activity_id, habitat_id, feeding_success_id, bin1, bin2,
                chicks_present, nests_present, fledglings_present
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(survey.survey_identifier)
        .bind(position as i64)
        .bind(observation.species_id)
        .bind(observation.primary_activity_id)
        .bind(observation.secondary_activity_id)
        .bind(observation.habitat_id)
        .bind(observation.feeding_success_id)
        .bind(observation.bin1)
        .bind(observation.bin2)
        .bind(observation.chicks_present)
        .bind(observation.nests_present)
        .bind(observation.fledglings_present)
        .execute(&mut *conn)
        .await?;
    }

    for (position, disturbance) in survey.disturbances.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO disturbances (
                survey_identifier, position, disturbance_type_id, duration_minutes,
                quantity, result
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(survey.survey_identifier)
        .bind(position as i64)
        .bind(disturbance.disturbance_type_id)
        .bind(disturbance.duration_minutes)
        .bind(disturbance.quantity)
        .bind(&disturbance.result)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

fn insert_error(e: sqlx::Error, identifier: Uuid) -> SurveyError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return SurveyError::validation(format!("survey {identifier} already exists"));
        }
    }
    SurveyError::Storage(e)
}

fn survey_from_row(row: &SqliteRow) -> SurveyResult<Survey> {
    let survey_type: String = row.try_get("survey_type")?;
    let status: String = row.try_get("status")?;

    let survey_type = SurveyType::parse(&survey_type).ok_or_else(|| {
        SurveyError::Storage(sqlx::Error::Decode(
            format!("unknown survey type '{survey_type}'").into(),
        ))
    })?;
    let variant = SurveyVariant::parse(&status).ok_or_else(|| {
        SurveyError::Storage(sqlx::Error::Decode(
            format!("unknown survey status '{status}'").into(),
        ))
    })?;

    Ok(Survey {
        id: Some(row.try_get("id")?),
        survey_identifier: row.try_get("survey_identifier")?,
        survey_type,
        variant,
        location_id: row.try_get("location_id")?,
        site_type_id: row.try_get("site_type_id")?,
        access_point_id: row.try_get("access_point_id")?,
        vantage_point_id: row.try_get("vantage_point_id")?,
        tide_id: row.try_get("tide_id")?,
        weather_id: row.try_get("weather_id")?,
        water_height_id: row.try_get("water_height_id")?,
        wind_speed: row.try_get("wind_speed")?,
        temperature: row.try_get("temperature")?,
        observers: row.try_get("observers")?,
        survey_comments: row.try_get("survey_comments")?,
        disturbance_comments: row.try_get("disturbance_comments")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        submitted_by: row.try_get("submitted_by")?,
        observations: Vec::new(),
        disturbances: Vec::new(),
    })
}

fn observation_from_row(row: &SqliteRow) -> Result<Observation, sqlx::Error> {
    Ok(Observation {
        survey_identifier: row.try_get("survey_identifier")?,
        species_id: row.try_get("species_id")?,
        primary_activity_id: row.try_get("primary_activity_id")?,
        secondary_activity_id: row.try_get("secondary_activity_id")?,
        habitat_id: row.try_get("habitat_id")?,
        feeding_success_id: row.try_get("feeding_success_id")?,
        bin1: row.try_get("bin1")?,
        bin2: row.try_get("bin2")?,
        chicks_present: row.try_get("chicks_present")?,
        nests_present: row.try_get("nests_present")?,
        fledglings_present: row.try_get("fledglings_present")?,
    })
}

fn disturbance_from_row(row: &SqliteRow) -> Result<Disturbance, sqlx::Error> {
    Ok(Disturbance {
        survey_identifier: row.try_get("survey_identifier")?,
        disturbance_type_id: row.try_get("disturbance_type_id")?,
        duration_minutes: row.try_get("duration_minutes")?,
        quantity: row.try_get("quantity")?,
        result: row.try_get("result")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn memory_storage() -> Storage {
        Storage::new("sqlite::memory:", 5).await.unwrap()
    }

    fn sample_survey(submitted_by: &str) -> Survey {
        let identifier = Uuid::new_v4();
        let mut survey = Survey::new(identifier, SurveyType::Rookery);
        survey.location_id = Some(3);
        survey.temperature = Some(18.5);
        survey.observers = "MR".to_string();
        survey.submitted_by = submitted_by.to_string();
        survey.start_date = NaiveDate::from_ymd_opt(2021, 4, 12)
            .unwrap()
            .and_hms_opt(6, 45, 0);
        survey.observations = vec![
            Observation {
                survey_identifier: identifier,
                species_id: Some(1),
                bin1: Some(4),
                nests_present: Some(true),
                ..Observation::default()
            },
            Observation {
                survey_identifier: identifier,
                species_id: Some(2),
                bin1: Some(9),
                chicks_present: Some(false),
                ..Observation::default()
            },
        ];
        survey.disturbances = vec![Disturbance {
            survey_identifier: identifier,
            disturbance_type_id: Some(5),
            duration_minutes: Some(10),
            quantity: Some(2),
            result: "Birds flushed".to_string(),
        }];
        survey
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let storage = memory_storage().await;
        let survey = sample_survey("observer-1");

        let id = storage.insert(&survey).await.unwrap();
        let fetched = storage
            .fetch_by_identifier(survey.survey_identifier)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(fetched.id, Some(id));
        assert_eq!(fetched, Survey { id: Some(id), ..survey });
    }

    #[tokio::test]
    async fn test_fetch_unknown_identifier() {
        let storage = memory_storage().await;

        let fetched = storage.fetch_by_identifier(Uuid::new_v4()).await.unwrap();

        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_identifier_is_validation_error() {
        let storage = memory_storage().await;
        let survey = sample_survey("observer-1");

        storage.insert(&survey).await.unwrap();
        let err = storage.insert(&survey).await.unwrap_err();

        assert!(matches!(err, SurveyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_replace_rewrites_children() {
        let storage = memory_storage().await;
        let mut survey = sample_survey("observer-1");
        let id = storage.insert(&survey).await.unwrap();

        survey.variant = SurveyVariant::Completed;
        survey.observations.truncate(1);
        survey.disturbances.clear();
        survey.observers = "MR, TS".to_string();

        let replaced = storage.replace(&survey).await.unwrap();
        assert_eq!(replaced, Some(id));

        let fetched = storage
            .fetch_by_identifier(survey.survey_identifier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.variant, SurveyVariant::Completed);
        assert_eq!(fetched.observations.len(), 1);
        assert!(fetched.disturbances.is_empty());
        assert_eq!(fetched.observers, "MR, TS");
    }

    #[tokio::test]
    async fn test_replace_unknown_survey() {
        let storage = memory_storage().await;

        let replaced = storage.replace(&sample_survey("observer-1")).await.unwrap();

        assert!(replaced.is_none());
    }

    #[tokio::test]
    async fn test_fetch_by_submitter_and_type() {
        let storage = memory_storage().await;

        let mut completed = sample_survey("observer-1");
        completed.variant = SurveyVariant::Completed;
        storage.insert(&completed).await.unwrap();
        storage.insert(&sample_survey("observer-1")).await.unwrap();
        storage.insert(&sample_survey("observer-2")).await.unwrap();

        assert_eq!(storage.fetch_by_submitter("observer-1").await.unwrap().len(), 2);
        assert!(storage.fetch_by_submitter("nobody").await.unwrap().is_empty());

        let all = storage.fetch_by_type(SurveyType::Rookery, false).await.unwrap();
        assert_eq!(all.len(), 3);

        let done = storage.fetch_by_type(SurveyType::Rookery, true).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].survey_identifier, completed.survey_identifier);

        let foraging = storage.fetch_by_type(SurveyType::Foraging, false).await.unwrap();
        assert!(foraging.is_empty());
    }
}
