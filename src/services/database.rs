use surrealdb::{Surreal, engine::local::{Db, Mem}, sql::Thing};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;
use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{
    activity::{Activity, Position},
    notification::{DeliveryStatus, Notification},
    participation::{Participation, ParticipationStatus},
    skills::normalize,
    volunteer::Volunteer,
};

const VOLUNTEERS: &str = "volunteers";
const ACTIVITIES: &str = "activities";
const POSITIONS: &str = "positions";
const PARTICIPATIONS: &str = "participations";
const NOTIFICATIONS: &str = "notifications";

#[derive(Clone)]
pub struct DatabaseService {
    db: Surreal<Db>,
}

/// Outcome of an insert guarded by a unique index.
#[derive(Debug)]
pub enum InsertOutcome<T> {
    Inserted(T),
    Duplicate,
}

impl DatabaseService {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db = if database_url.starts_with("memory://") {
            Surreal::new::<Mem>(()).await?
        } else {
            return Err(anyhow!("Unsupported database URL: {}", database_url));
        };

        db.use_ns("volunteer_match").use_db("main").await?;

        let service = Self { db };
        service.initialize_schema().await?;

        Ok(service)
    }

    async fn initialize_schema(&self) -> Result<()> {
        self.db.query("
            DEFINE TABLE volunteers SCHEMALESS;
            DEFINE INDEX unique_volunteer_email ON TABLE volunteers COLUMNS email UNIQUE;

            DEFINE TABLE activities SCHEMALESS;
            DEFINE INDEX activity_org ON TABLE activities COLUMNS org_id;

            DEFINE TABLE positions SCHEMALESS;
            DEFINE INDEX position_activity ON TABLE positions COLUMNS activity_id;

            DEFINE TABLE participations SCHEMALESS;
            DEFINE INDEX unique_participation ON TABLE participations COLUMNS volunteer_id, activity_id UNIQUE;

            DEFINE TABLE notifications SCHEMALESS;
            DEFINE INDEX notification_volunteer ON TABLE notifications COLUMNS volunteer_id;
        ").await?.check()?;

        log::info!("Database schema initialized successfully");
        Ok(())
    }

    async fn select<R>(&self, table: &str, key: &Uuid) -> Result<Option<R>>
    where
        R: DeserializeOwned,
    {
        let record: Option<R> = self.db.select((table, key.to_string())).await?;
        Ok(record)
    }

    async fn replace<R>(&self, table: &str, key: &Uuid, record: R) -> Result<R>
    where
        R: Serialize + DeserializeOwned,
    {
        let updated: Option<R> = self.db
            .update((table, key.to_string()))
            .content(record)
            .await?;

        updated.ok_or_else(|| anyhow!("Failed to update {}:{}", table, key))
    }

    async fn list<R>(&self, sql: &'static str, field: &'static str, value: &Uuid) -> Result<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let records: Vec<R> = self.db
            .query(sql)
            .bind((field, value.to_string()))
            .await?
            .take(0)?;
        Ok(records)
    }

    // Volunteer operations
    pub async fn create_volunteer(&self, volunteer: &Volunteer) -> Result<InsertOutcome<Volunteer>> {
        if self.get_volunteer_by_email(&volunteer.email).await?.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        let created: surrealdb::Result<Option<VolunteerRecord>> = self.db
            .create((VOLUNTEERS, volunteer.id.to_string()))
            .content(VolunteerRecord::from(volunteer))
            .await;

        match created {
            Ok(Some(record)) => Ok(InsertOutcome::Inserted(record.try_into()?)),
            Ok(None) => Err(anyhow!("Failed to create volunteer")),
            // A concurrent registration may have taken the email after the check above.
            Err(err) => match self.get_volunteer_by_email(&volunteer.email).await? {
                Some(_) => Ok(InsertOutcome::Duplicate),
                None => Err(err.into()),
            },
        }
    }

    pub async fn get_volunteer(&self, volunteer_id: &Uuid) -> Result<Option<Volunteer>> {
        self.select::<VolunteerRecord>(VOLUNTEERS, volunteer_id)
            .await?
            .map(Volunteer::try_from)
            .transpose()
    }

    pub async fn get_volunteer_by_email(&self, email: &str) -> Result<Option<Volunteer>> {
        let records: Vec<VolunteerRecord> = self.db
            .query("SELECT * FROM volunteers WHERE email = $email")
            .bind(("email", email.to_lowercase()))
            .await?
            .take(0)?;

        records.into_iter().next().map(Volunteer::try_from).transpose()
    }

    pub async fn update_volunteer(&self, volunteer: &Volunteer) -> Result<Volunteer> {
        self.replace(VOLUNTEERS, &volunteer.id, VolunteerRecord::from(volunteer))
            .await?
            .try_into()
    }

    /// Volunteers with at least one skill, in registration order.
    pub async fn list_skilled_volunteers(&self) -> Result<Vec<Volunteer>> {
        let records: Vec<VolunteerRecord> = self.db
            .query("SELECT * FROM volunteers WHERE skills != ''")
            .await?
            .take(0)?;

        let mut volunteers = records
            .into_iter()
            .map(Volunteer::try_from)
            .collect::<Result<Vec<_>>>()?;
        volunteers.sort_by_key(|v| v.created_at);
        Ok(volunteers)
    }

    /// Skilled volunteers not yet linked to the activity through any position.
    pub async fn available_volunteers(&self, activity_id: &Uuid) -> Result<Vec<Volunteer>> {
        let joined: Vec<Uuid> = self
            .participations_for_activity(activity_id)
            .await?
            .into_iter()
            .map(|p| p.volunteer_id)
            .collect();

        Ok(self
            .list_skilled_volunteers()
            .await?
            .into_iter()
            .filter(|v| !joined.contains(&v.id))
            .collect())
    }

    // Activity operations

    /// Writes an activity, its positions and the notifications raised for
    /// them in a single transaction.
    pub async fn create_activity_bundle(
        &self,
        activity: &Activity,
        positions: &[Position],
        notifications: &[Notification],
    ) -> Result<()> {
        let mut sql = String::from(
            "BEGIN TRANSACTION;\nCREATE type::thing('activities', $activity_key) CONTENT $activity;\n",
        );
        for i in 0..positions.len() {
            sql.push_str(&format!(
                "CREATE type::thing('positions', $position_key_{i}) CONTENT $position_{i};\n"
            ));
        }
        for i in 0..notifications.len() {
            sql.push_str(&format!(
                "CREATE type::thing('notifications', $notification_key_{i}) CONTENT $notification_{i};\n"
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = self.db
            .query(sql)
            .bind(("activity_key", activity.id.to_string()))
            .bind(("activity", ActivityRecord::from(activity)));

        for (i, position) in positions.iter().enumerate() {
            query = query
                .bind((format!("position_key_{i}"), position.id.to_string()))
                .bind((format!("position_{i}"), PositionRecord::from(position)));
        }
        for (i, notification) in notifications.iter().enumerate() {
            query = query
                .bind((format!("notification_key_{i}"), notification.id.to_string()))
                .bind((format!("notification_{i}"), NotificationRecord::from(notification)));
        }

        query.await?.check()?;

        log::info!(
            "Created activity {} with {} position(s) and {} notification(s)",
            activity.id,
            positions.len(),
            notifications.len()
        );
        Ok(())
    }

    pub async fn get_activity(&self, activity_id: &Uuid) -> Result<Option<Activity>> {
        self.select::<ActivityRecord>(ACTIVITIES, activity_id)
            .await?
            .map(Activity::try_from)
            .transpose()
    }

    /// All activities, earliest start first.
    pub async fn list_activities(&self) -> Result<Vec<Activity>> {
        let records: Vec<ActivityRecord> = self.db
            .query("SELECT * FROM activities")
            .await?
            .take(0)?;

        let mut activities = records
            .into_iter()
            .map(Activity::try_from)
            .collect::<Result<Vec<_>>>()?;
        activities.sort_by_key(|a| (a.start_date, a.created_at));
        Ok(activities)
    }

    /// Activities owned by an organization, latest start first.
    pub async fn activities_for_org(&self, org_id: &Uuid) -> Result<Vec<Activity>> {
        let records: Vec<ActivityRecord> = self
            .list("SELECT * FROM activities WHERE org_id = $org_id", "org_id", org_id)
            .await?;

        let mut activities = records
            .into_iter()
            .map(Activity::try_from)
            .collect::<Result<Vec<_>>>()?;
        activities.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.created_at.cmp(&a.created_at)));
        Ok(activities)
    }

    pub async fn get_position(&self, position_id: &Uuid) -> Result<Option<Position>> {
        self.select::<PositionRecord>(POSITIONS, position_id)
            .await?
            .map(Position::try_from)
            .transpose()
    }

    pub async fn positions_for_activity(&self, activity_id: &Uuid) -> Result<Vec<Position>> {
        let records: Vec<PositionRecord> = self
            .list("SELECT * FROM positions WHERE activity_id = $activity_id", "activity_id", activity_id)
            .await?;

        let mut positions = records
            .into_iter()
            .map(Position::try_from)
            .collect::<Result<Vec<_>>>()?;
        positions.sort_by_key(|p| p.ordinal);
        Ok(positions)
    }

    // Participation operations

    /// Inserts the join record; when it names a position the fill counter is
    /// incremented in the same transaction. The unique index on
    /// (volunteer_id, activity_id) decides concurrent attempts.
    pub async fn insert_participation(&self, participation: &Participation) -> Result<InsertOutcome<Participation>> {
        let record = ParticipationRecord::from(participation);

        let written: surrealdb::Result<()> = match participation.position_id {
            None => self.db
                .create::<Option<ParticipationRecord>>((PARTICIPATIONS, participation.id.to_string()))
                .content(record)
                .await
                .map(|_| ()),
            Some(position_id) => self.db
                .query("
                    BEGIN TRANSACTION;
                    CREATE type::thing('participations', $participation_key) CONTENT $participation;
                    UPDATE type::thing('positions', $position_key) SET filled += 1;
                    COMMIT TRANSACTION;
                ")
                .bind(("participation_key", participation.id.to_string()))
                .bind(("participation", record))
                .bind(("position_key", position_id.to_string()))
                .await
                .and_then(|response| response.check())
                .map(|_| ()),
        };

        match written {
            Ok(()) => Ok(InsertOutcome::Inserted(participation.clone())),
            Err(err) => {
                // A failed insert is a duplicate exactly when the pair is already present.
                match self.find_participation(&participation.volunteer_id, &participation.activity_id).await? {
                    Some(existing) if existing.id != participation.id => Ok(InsertOutcome::Duplicate),
                    _ => Err(err.into()),
                }
            }
        }
    }

    pub async fn find_participation(&self, volunteer_id: &Uuid, activity_id: &Uuid) -> Result<Option<Participation>> {
        let records: Vec<ParticipationRecord> = self.db
            .query("SELECT * FROM participations WHERE volunteer_id = $volunteer_id AND activity_id = $activity_id")
            .bind(("volunteer_id", volunteer_id.to_string()))
            .bind(("activity_id", activity_id.to_string()))
            .await?
            .take(0)?;

        records.into_iter().next().map(Participation::try_from).transpose()
    }

    pub async fn get_participation(&self, participation_id: &Uuid) -> Result<Option<Participation>> {
        self.select::<ParticipationRecord>(PARTICIPATIONS, participation_id)
            .await?
            .map(Participation::try_from)
            .transpose()
    }

    pub async fn update_participation(&self, participation: &Participation) -> Result<Participation> {
        self.replace(PARTICIPATIONS, &participation.id, ParticipationRecord::from(participation))
            .await?
            .try_into()
    }

    pub async fn participations_for_activity(&self, activity_id: &Uuid) -> Result<Vec<Participation>> {
        let records: Vec<ParticipationRecord> = self
            .list("SELECT * FROM participations WHERE activity_id = $activity_id", "activity_id", activity_id)
            .await?;

        let mut participations = records
            .into_iter()
            .map(Participation::try_from)
            .collect::<Result<Vec<_>>>()?;
        participations.sort_by_key(|p| p.joined_at);
        Ok(participations)
    }

    pub async fn participations_for_volunteer(&self, volunteer_id: &Uuid) -> Result<Vec<Participation>> {
        let records: Vec<ParticipationRecord> = self
            .list("SELECT * FROM participations WHERE volunteer_id = $volunteer_id", "volunteer_id", volunteer_id)
            .await?;

        records.into_iter().map(Participation::try_from).collect()
    }

    // Notification operations
    pub async fn create_notification(&self, notification: &Notification) -> Result<Notification> {
        let created: Option<NotificationRecord> = self.db
            .create((NOTIFICATIONS, notification.id.to_string()))
            .content(NotificationRecord::from(notification))
            .await?;

        created
            .ok_or_else(|| anyhow!("Failed to create notification"))?
            .try_into()
    }

    pub async fn get_notification(&self, notification_id: &Uuid) -> Result<Option<Notification>> {
        self.select::<NotificationRecord>(NOTIFICATIONS, notification_id)
            .await?
            .map(Notification::try_from)
            .transpose()
    }

    pub async fn update_notification(&self, notification: &Notification) -> Result<Notification> {
        self.replace(NOTIFICATIONS, &notification.id, NotificationRecord::from(notification))
            .await?
            .try_into()
    }

    /// Newest first.
    pub async fn notifications_for_volunteer(&self, volunteer_id: &Uuid) -> Result<Vec<Notification>> {
        let records: Vec<NotificationRecord> = self
            .list("SELECT * FROM notifications WHERE volunteer_id = $volunteer_id", "volunteer_id", volunteer_id)
            .await?;

        let mut notifications = records
            .into_iter()
            .map(Notification::try_from)
            .collect::<Result<Vec<_>>>()?;
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    /// Notifications whose email was never settled, oldest first.
    pub async fn pending_notifications(&self) -> Result<Vec<Notification>> {
        let records: Vec<NotificationRecord> = self.db
            .query("SELECT * FROM notifications WHERE delivery_status = 'pending'")
            .await?
            .take(0)?;

        let mut notifications = records
            .into_iter()
            .map(Notification::try_from)
            .collect::<Result<Vec<_>>>()?;
        notifications.sort_by_key(|n| n.created_at);
        Ok(notifications)
    }

    // Utility methods
    pub async fn health_check(&self) -> Result<()> {
        self.db.health().await?;
        Ok(())
    }

    pub async fn get_statistics(&self) -> Result<DatabaseStats> {
        let mut response = self.db
            .query("SELECT count() FROM volunteers GROUP ALL")
            .query("SELECT count() FROM activities GROUP ALL")
            .query("SELECT count() FROM participations GROUP ALL")
            .query("SELECT count() FROM notifications WHERE delivery_status = 'pending' GROUP ALL")
            .query("SELECT count() FROM notifications WHERE delivery_status = 'failed' GROUP ALL")
            .await?;

        let volunteers: Vec<serde_json::Value> = response.take(0)?;
        let activities: Vec<serde_json::Value> = response.take(1)?;
        let participations: Vec<serde_json::Value> = response.take(2)?;
        let pending: Vec<serde_json::Value> = response.take(3)?;
        let failed: Vec<serde_json::Value> = response.take(4)?;

        Ok(DatabaseStats {
            total_volunteers: extract_count(&volunteers),
            total_activities: extract_count(&activities),
            total_participations: extract_count(&participations),
            pending_deliveries: extract_count(&pending),
            failed_deliveries: extract_count(&failed),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub total_volunteers: u64,
    pub total_activities: u64,
    pub total_participations: u64,
    pub pending_deliveries: u64,
    pub failed_deliveries: u64,
}

fn extract_count(result: &[serde_json::Value]) -> u64 {
    result.first()
        .and_then(|v| v.get("count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

/// Record keys are the string form of the domain UUID.
fn record_key(id: Option<&Thing>) -> Result<Uuid> {
    let thing = id.ok_or_else(|| anyhow!("Record returned without an id"))?;
    Uuid::parse_str(&thing.id.to_raw())
        .map_err(|err| anyhow!("Record {} has a non-uuid key: {}", thing, err))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|err| anyhow!("Invalid stored uuid {:?}: {}", raw, err))
}

// Storage records. Skill sets are kept as their comma-joined display form.

#[derive(Debug, Serialize, Deserialize)]
struct VolunteerRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    first_name: String,
    last_name: String,
    email: String,
    phone: Option<String>,
    skills: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Volunteer> for VolunteerRecord {
    fn from(volunteer: &Volunteer) -> Self {
        Self {
            id: None,
            first_name: volunteer.first_name.clone(),
            last_name: volunteer.last_name.clone(),
            email: volunteer.email.clone(),
            phone: volunteer.phone.clone(),
            skills: volunteer.skills.to_string(),
            created_at: volunteer.created_at,
            updated_at: volunteer.updated_at,
        }
    }
}

impl TryFrom<VolunteerRecord> for Volunteer {
    type Error = anyhow::Error;

    fn try_from(record: VolunteerRecord) -> Result<Self> {
        Ok(Self {
            id: record_key(record.id.as_ref())?,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            phone: record.phone,
            skills: normalize(&record.skills),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ActivityRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    org_id: String,
    name: String,
    activity_type: String,
    place: String,
    description: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    reg_open: Option<DateTime<Utc>>,
    reg_close: Option<DateTime<Utc>>,
    required_skills: String,
    created_at: DateTime<Utc>,
}

impl From<&Activity> for ActivityRecord {
    fn from(activity: &Activity) -> Self {
        Self {
            id: None,
            org_id: activity.org_id.to_string(),
            name: activity.name.clone(),
            activity_type: activity.activity_type.clone(),
            place: activity.place.clone(),
            description: activity.description.clone(),
            start_date: activity.start_date,
            end_date: activity.end_date,
            reg_open: activity.reg_open,
            reg_close: activity.reg_close,
            required_skills: activity.required_skills.to_string(),
            created_at: activity.created_at,
        }
    }
}

impl TryFrom<ActivityRecord> for Activity {
    type Error = anyhow::Error;

    fn try_from(record: ActivityRecord) -> Result<Self> {
        Ok(Self {
            id: record_key(record.id.as_ref())?,
            org_id: parse_uuid(&record.org_id)?,
            name: record.name,
            activity_type: record.activity_type,
            place: record.place,
            description: record.description,
            start_date: record.start_date,
            end_date: record.end_date,
            reg_open: record.reg_open,
            reg_close: record.reg_close,
            required_skills: normalize(&record.required_skills),
            created_at: record.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    activity_id: String,
    ordinal: u32,
    title: String,
    required_skills: String,
    slots: u32,
    filled: u32,
    created_at: DateTime<Utc>,
}

impl From<&Position> for PositionRecord {
    fn from(position: &Position) -> Self {
        Self {
            id: None,
            activity_id: position.activity_id.to_string(),
            ordinal: position.ordinal,
            title: position.title.clone(),
            required_skills: position.required_skills.to_string(),
            slots: position.slots,
            filled: position.filled,
            created_at: position.created_at,
        }
    }
}

impl TryFrom<PositionRecord> for Position {
    type Error = anyhow::Error;

    fn try_from(record: PositionRecord) -> Result<Self> {
        Ok(Self {
            id: record_key(record.id.as_ref())?,
            activity_id: parse_uuid(&record.activity_id)?,
            ordinal: record.ordinal,
            title: record.title,
            required_skills: normalize(&record.required_skills),
            slots: record.slots,
            filled: record.filled,
            created_at: record.created_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ParticipationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    volunteer_id: String,
    activity_id: String,
    position_id: Option<String>,
    attendance: bool,
    performance_rating: Option<u8>,
    status: ParticipationStatus,
    joined_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<&Participation> for ParticipationRecord {
    fn from(participation: &Participation) -> Self {
        Self {
            id: None,
            volunteer_id: participation.volunteer_id.to_string(),
            activity_id: participation.activity_id.to_string(),
            position_id: participation.position_id.map(|id| id.to_string()),
            attendance: participation.attendance,
            performance_rating: participation.performance_rating,
            status: participation.status,
            joined_at: participation.joined_at,
            updated_at: participation.updated_at,
        }
    }
}

impl TryFrom<ParticipationRecord> for Participation {
    type Error = anyhow::Error;

    fn try_from(record: ParticipationRecord) -> Result<Self> {
        Ok(Self {
            id: record_key(record.id.as_ref())?,
            volunteer_id: parse_uuid(&record.volunteer_id)?,
            activity_id: parse_uuid(&record.activity_id)?,
            position_id: record.position_id.as_deref().map(parse_uuid).transpose()?,
            attendance: record.attendance,
            performance_rating: record.performance_rating,
            status: record.status,
            joined_at: record.joined_at,
            updated_at: record.updated_at,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NotificationRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Thing>,
    volunteer_id: String,
    activity_id: String,
    position_id: Option<String>,
    message: String,
    delivery_status: DeliveryStatus,
    delivery_attempts: u32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<&Notification> for NotificationRecord {
    fn from(notification: &Notification) -> Self {
        Self {
            id: None,
            volunteer_id: notification.volunteer_id.to_string(),
            activity_id: notification.activity_id.to_string(),
            position_id: notification.position_id.map(|id| id.to_string()),
            message: notification.message.clone(),
            delivery_status: notification.delivery_status,
            delivery_attempts: notification.delivery_attempts,
            last_error: notification.last_error.clone(),
            created_at: notification.created_at,
            delivered_at: notification.delivered_at,
        }
    }
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = anyhow::Error;

    fn try_from(record: NotificationRecord) -> Result<Self> {
        Ok(Self {
            id: record_key(record.id.as_ref())?,
            volunteer_id: parse_uuid(&record.volunteer_id)?,
            activity_id: parse_uuid(&record.activity_id)?,
            position_id: record.position_id.as_deref().map(parse_uuid).transpose()?,
            message: record.message,
            delivery_status: record.delivery_status,
            delivery_attempts: record.delivery_attempts,
            last_error: record.last_error,
            created_at: record.created_at,
            delivered_at: record.delivered_at,
        })
    }
}
