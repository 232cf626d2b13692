use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Owner, VoterContactRecord};
use crate::store::{ContactStore, PersonFilter, RecordFilter, UploadStatus};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgContactStore {
    pool: PgPool,
}

impl PgContactStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<VoterContactRecord, sqlx::Error> {
    Ok(VoterContactRecord {
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        team: row.try_get("team")?,
        date: row.try_get("date")?,
        tactic: row.try_get("tactic")?,
        attempts: row.try_get("attempts")?,
        contacts: row.try_get("contacts")?,
        not_home: row.try_get("not_home")?,
        refusal: row.try_get("refusal")?,
        bad_data: row.try_get("bad_data")?,
        support: row.try_get("support")?,
        oppose: row.try_get("oppose")?,
        undecided: row.try_get("undecided")?,
        user_id: row.try_get("user_id")?,
        user_email: row.try_get("user_email")?,
        label: row.try_get("label")?,
    })
}

fn push_equals_ignore_case(builder: &mut QueryBuilder<'_, Postgres>, column: &str, value: &str) {
    builder.push(format!(" AND lower({column}) = lower("));
    builder.push_bind(value.to_string());
    builder.push(")");
}

#[async_trait]
impl ContactStore for PgContactStore {
    async fn start_upload(&self, owner: &Owner) -> Result<Uuid, StoreError> {
        let upload_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO voter_contact.uploads (id, user_id, user_email, status)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(upload_id)
        .bind(&owner.user_id)
        .bind(&owner.email)
        .bind(UploadStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(upload_id)
    }

    async fn insert_batch(
        &self,
        upload_id: Uuid,
        records: &[VoterContactRecord],
    ) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO voter_contact.records \
             (upload_id, user_id, user_email, label, first_name, last_name, team, date, tactic, \
              attempts, contacts, not_home, refusal, bad_data, support, oppose, undecided) ",
        );

        builder.push_values(records, |mut row, record| {
            row.push_bind(upload_id)
                .push_bind(record.user_id.clone())
                .push_bind(record.user_email.clone())
                .push_bind(record.label.clone())
                .push_bind(record.first_name.clone())
                .push_bind(record.last_name.clone())
                .push_bind(record.team.clone())
                .push_bind(record.date.clone())
                .push_bind(record.tactic.clone())
                .push_bind(record.attempts)
                .push_bind(record.contacts)
                .push_bind(record.not_home)
                .push_bind(record.refusal)
                .push_bind(record.bad_data)
                .push_bind(record.support)
                .push_bind(record.oppose)
                .push_bind(record.undecided);
        });

        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn commit_upload(
        &self,
        owner: &Owner,
        upload_id: Uuid,
        record_count: usize,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // records of superseded generations go with them (ON DELETE CASCADE)
        sqlx::query("DELETE FROM voter_contact.uploads WHERE user_id = $1 AND id <> $2")
            .bind(&owner.user_id)
            .bind(upload_id)
            .execute(&mut *tx)
            .await?;

        let updated = sqlx::query(
            r#"
            UPDATE voter_contact.uploads
            SET status = $2, record_count = $3, completed_at = now()
            WHERE id = $1
            "#,
        )
        .bind(upload_id)
        .bind(UploadStatus::Committed.as_str())
        .bind(record_count as i64)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            return Err(StoreError::Backend(format!("upload {upload_id} not found")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn discard_upload(&self, upload_id: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM voter_contact.records WHERE upload_id = $1")
            .bind(upload_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE voter_contact.uploads SET status = $2, completed_at = now() WHERE id = $1",
        )
        .bind(upload_id)
        .bind(UploadStatus::Failed.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn clear_user(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            r#"
            DELETE FROM voter_contact.records
            WHERE upload_id IN (SELECT id FROM voter_contact.uploads WHERE user_id = $1)
            "#,
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("DELETE FROM voter_contact.uploads WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed)
    }

    async fn fetch_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<VoterContactRecord>, StoreError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT r.first_name, r.last_name, r.team, r.date, r.tactic, \
             r.attempts, r.contacts, r.not_home, r.refusal, r.bad_data, \
             r.support, r.oppose, r.undecided, r.user_id, r.user_email, r.label \
             FROM voter_contact.records r \
             JOIN voter_contact.uploads u ON u.id = r.upload_id \
             WHERE u.status = ",
        );
        builder.push_bind(UploadStatus::Committed.as_str());

        if let Some(user_id) = &filter.user_id {
            builder.push(" AND r.user_id = ");
            builder.push_bind(user_id.clone());
        }
        if let Some(tactic) = &filter.tactic {
            push_equals_ignore_case(&mut builder, "r.tactic", tactic);
        }
        if let Some(date) = &filter.date {
            push_equals_ignore_case(&mut builder, "r.date", date);
        }
        if let Some(team) = &filter.team {
            push_equals_ignore_case(&mut builder, "r.team", team);
        }
        match &filter.person {
            Some(PersonFilter::Full { first, last }) => {
                push_equals_ignore_case(&mut builder, "r.first_name", first);
                push_equals_ignore_case(&mut builder, "r.last_name", last);
            }
            Some(PersonFilter::Either(name)) => {
                builder.push(" AND (lower(r.first_name) = lower(");
                builder.push_bind(name.clone());
                builder.push(") OR lower(r.last_name) = lower(");
                builder.push_bind(name.clone());
                builder.push("))");
            }
            None => {}
        }
        builder.push(" ORDER BY r.date, r.id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            records.push(record_from_row(row)?);
        }

        Ok(records)
    }
}
