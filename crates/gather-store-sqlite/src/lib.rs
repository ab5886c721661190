//! SQLite backend for gather.
//!
//! Group and user snapshots are kept as JSON documents, the way they are
//! embedded in the API payloads. Invitations, confirmations and applications
//! are rows so that membership changes are single conditional statements.

use chrono::{DateTime, Utc};
use gather_storage::{
    Application, Encounter, EncounterId, EncounterParams, EncounterStore, Group, Proposal,
    ProposalId, ProposalParams, ProposalStore, Specification, StoreError, User, UserId,
};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// (id, name, description, location, time, json document)
type DocumentRow = (String, String, String, String, String, String);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        // A single connection that never expires: an in-memory database lives
        // and dies with its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(url)
            .await
            .map_err(backend)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn hydrate_encounter(&self, row: DocumentRow) -> Result<Encounter, StoreError> {
        let (id, name, description, location, time, groups) = row;

        let invited = sqlx::query_as::<_, (String,)>(
            "SELECT user FROM encounter_invitations WHERE encounter_id=? ORDER BY position",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let confirmed = sqlx::query_as::<_, (String,)>(
            "SELECT user FROM encounter_confirmations WHERE encounter_id=? ORDER BY rowid",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(Encounter {
            id: Some(EncounterId(id)),
            specification: specification(name, description, location, &time)?,
            groups: from_json::<Vec<Group>>(&groups)?,
            invited_users: users_from_rows(invited)?,
            confirmed_users: users_from_rows(confirmed)?,
        })
    }

    async fn hydrate_proposal(&self, row: DocumentRow) -> Result<Proposal, StoreError> {
        let (id, name, description, location, time, creator) = row;

        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT description, creator FROM proposal_applications
             WHERE proposal_id=? ORDER BY id",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut applications = Vec::with_capacity(rows.len());
        for (description, creator) in rows {
            applications.push(Application {
                description,
                creator: from_json(&creator)?,
            });
        }

        Ok(Proposal {
            id: Some(ProposalId(id)),
            specification: specification(name, description, location, &time)?,
            creator: from_json(&creator)?,
            applications,
        })
    }
}

/// Replace the invitation list of an encounter inside `tx`.
///
/// Users that stay invited keep their row (and with it any confirmation,
/// whose snapshot is refreshed alongside); users that were dropped lose their
/// confirmation through the cascade.
async fn replace_invitations(
    tx: &mut Transaction<'_, Sqlite>,
    encounter_id: &str,
    params: &EncounterParams,
) -> Result<(), StoreError> {
    // One row per user: a repeated id would collapse into a single row at
    // its last position.
    if params.duplicate_invitation().is_some() {
        return Err(StoreError::Conflict);
    }

    let users = &params.invited_users;
    let keep: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
    sqlx::query(
        "DELETE FROM encounter_invitations
         WHERE encounter_id=? AND user_id NOT IN (SELECT value FROM json_each(?))",
    )
    .bind(encounter_id)
    .bind(to_json(&keep)?)
    .execute(&mut **tx)
    .await
    .map_err(backend)?;

    for (position, user) in users.iter().enumerate() {
        sqlx::query(
            "INSERT INTO encounter_invitations(encounter_id,user_id,position,user)
             VALUES(?,?,?,?)
             ON CONFLICT(encounter_id,user_id)
             DO UPDATE SET position=excluded.position, user=excluded.user",
        )
        .bind(encounter_id)
        .bind(user.id.as_str())
        .bind(position as i64)
        .bind(to_json(user)?)
        .execute(&mut **tx)
        .await
        .map_err(backend)?;

        sqlx::query(
            "UPDATE encounter_confirmations SET user=? WHERE encounter_id=? AND user_id=?",
        )
        .bind(to_json(user)?)
        .bind(encounter_id)
        .bind(user.id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(backend)?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl EncounterStore for SqliteStore {
    async fn create_encounter(&self, params: &EncounterParams) -> Result<Encounter, StoreError> {
        let id = new_object_id();
        let spec = &params.specification;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO encounters(id,name,description,location,time,group_snapshots,created_at)
             VALUES(?,?,?,?,?,?,?)",
        )
        .bind(&id)
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.location)
        .bind(spec.time.to_rfc3339())
        .bind(to_json(&params.groups)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;
        replace_invitations(&mut tx, &id, params).await?;
        tx.commit().await.map_err(backend)?;

        self.get_encounter(&EncounterId(id)).await
    }

    async fn get_encounter(&self, encounter_id: &EncounterId) -> Result<Encounter, StoreError> {
        check_object_id(encounter_id.as_str())?;
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id,name,description,location,time,group_snapshots
             FROM encounters WHERE id=?",
        )
        .bind(encounter_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => self.hydrate_encounter(row).await,
        }
    }

    async fn list_user_encounters(&self, user_id: &UserId) -> Result<Vec<Encounter>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT e.id,e.name,e.description,e.location,e.time,e.group_snapshots
             FROM encounters e
             JOIN encounter_invitations i ON i.encounter_id = e.id
             WHERE i.user_id=?
             ORDER BY e.rowid",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate_encounter(row).await?);
        }
        Ok(out)
    }

    async fn update_encounter(
        &self,
        encounter_id: &EncounterId,
        params: &EncounterParams,
    ) -> Result<Encounter, StoreError> {
        check_object_id(encounter_id.as_str())?;
        let spec = &params.specification;

        let mut tx = self.pool.begin().await.map_err(backend)?;
        let result = sqlx::query(
            "UPDATE encounters SET name=?,description=?,location=?,time=?,group_snapshots=?
             WHERE id=?",
        )
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.location)
        .bind(spec.time.to_rfc3339())
        .bind(to_json(&params.groups)?)
        .bind(encounter_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        replace_invitations(&mut tx, encounter_id.as_str(), params).await?;
        tx.commit().await.map_err(backend)?;

        self.get_encounter(encounter_id).await
    }

    async fn delete_encounter(&self, encounter_id: &EncounterId) -> Result<(), StoreError> {
        check_object_id(encounter_id.as_str())?;
        let result = sqlx::query("DELETE FROM encounters WHERE id=?")
            .bind(encounter_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn push_confirmed_user(
        &self,
        encounter_id: &EncounterId,
        user: &User,
    ) -> Result<bool, StoreError> {
        check_object_id(encounter_id.as_str())?;
        // The composite foreign key rejects users without an invitation.
        let result = sqlx::query(
            "INSERT INTO encounter_confirmations(encounter_id,user_id,user,confirmed_at)
             VALUES(?,?,?,?)
             ON CONFLICT(encounter_id,user_id) DO NOTHING",
        )
        .bind(encounter_id.as_str())
        .bind(user.id.as_str())
        .bind(to_json(user)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn pull_confirmed_user(
        &self,
        encounter_id: &EncounterId,
        user_id: &UserId,
    ) -> Result<bool, StoreError> {
        check_object_id(encounter_id.as_str())?;
        let result =
            sqlx::query("DELETE FROM encounter_confirmations WHERE encounter_id=? AND user_id=?")
                .bind(encounter_id.as_str())
                .bind(user_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(backend)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait::async_trait]
impl ProposalStore for SqliteStore {
    async fn create_proposal(&self, params: &ProposalParams) -> Result<Proposal, StoreError> {
        let id = new_object_id();
        let spec = &params.specification;

        sqlx::query(
            "INSERT INTO proposals(id,name,description,location,time,creator,created_at)
             VALUES(?,?,?,?,?,?,?)",
        )
        .bind(&id)
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.location)
        .bind(spec.time.to_rfc3339())
        .bind(to_json(&params.creator)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_proposal(&ProposalId(id)).await
    }

    async fn list_proposals(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Proposal>, StoreError> {
        let offset = i64::from(page) * i64::from(page_size);
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id,name,description,location,time,creator
             FROM proposals ORDER BY rowid LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate_proposal(row).await?);
        }
        Ok(out)
    }

    async fn list_user_proposals(&self, user_id: &UserId) -> Result<Vec<Proposal>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT p.id,p.name,p.description,p.location,p.time,p.creator
             FROM proposals p
             WHERE EXISTS (
                 SELECT 1 FROM json_each(p.creator, '$.leaders') AS l
                 WHERE json_extract(l.value, '$.id') = ?
             )
             ORDER BY p.rowid",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate_proposal(row).await?);
        }
        Ok(out)
    }

    async fn get_proposal(&self, proposal_id: &ProposalId) -> Result<Proposal, StoreError> {
        check_object_id(proposal_id.as_str())?;
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id,name,description,location,time,creator FROM proposals WHERE id=?",
        )
        .bind(proposal_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            None => Err(StoreError::NotFound),
            Some(row) => self.hydrate_proposal(row).await,
        }
    }

    async fn update_proposal(
        &self,
        proposal_id: &ProposalId,
        params: &ProposalParams,
    ) -> Result<Proposal, StoreError> {
        check_object_id(proposal_id.as_str())?;
        let spec = &params.specification;

        let result = sqlx::query(
            "UPDATE proposals SET name=?,description=?,location=?,time=?,creator=? WHERE id=?",
        )
        .bind(&spec.name)
        .bind(&spec.description)
        .bind(&spec.location)
        .bind(spec.time.to_rfc3339())
        .bind(to_json(&params.creator)?)
        .bind(proposal_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        self.get_proposal(proposal_id).await
    }

    async fn delete_proposal(&self, proposal_id: &ProposalId) -> Result<(), StoreError> {
        check_object_id(proposal_id.as_str())?;
        let result = sqlx::query("DELETE FROM proposals WHERE id=?")
            .bind(proposal_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn append_application(
        &self,
        proposal_id: &ProposalId,
        application: &Application,
    ) -> Result<Proposal, StoreError> {
        check_object_id(proposal_id.as_str())?;
        sqlx::query(
            "INSERT INTO proposal_applications(proposal_id,description,creator,created_at)
             VALUES(?,?,?,?)",
        )
        .bind(proposal_id.as_str())
        .bind(&application.description)
        .bind(to_json(&application.creator)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        self.get_proposal(proposal_id).await
    }
}

// ───────────────────────────── Helpers ─────────────────────────────

/// Object-id style identifier: 6 bytes of unix-millis timestamp followed by
/// 6 random bytes, rendered as 24 hex characters.
fn new_object_id() -> String {
    let bytes = Uuid::now_v7().into_bytes();
    let mut id = [0u8; 12];
    id[..6].copy_from_slice(&bytes[..6]);
    id[6..].copy_from_slice(&bytes[10..]);
    hex::encode(id)
}

fn check_object_id(id: &str) -> Result<(), StoreError> {
    if id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn write_error(e: sqlx::Error) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        Some(db) if db.is_foreign_key_violation() => StoreError::NotFound,
        _ => backend(e),
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|e| StoreError::Backend(e.to_string()))
}

fn users_from_rows(rows: Vec<(String,)>) -> Result<Vec<User>, StoreError> {
    rows.into_iter().map(|(user,)| from_json(&user)).collect()
}

fn specification(
    name: String,
    description: String,
    location: String,
    time: &str,
) -> Result<Specification, StoreError> {
    let time = DateTime::parse_from_rfc3339(time)
        .map_err(|e| StoreError::Backend(format!("bad time {time}: {e}")))?
        .with_timezone(&Utc);
    Ok(Specification {
        name,
        description,
        location,
        time,
    })
}
