use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use upkeep_core::domain::agreement::{
    AgreementId, AgreementStatus, CustomerSnapshot, ServiceAgreement, Site,
};
use upkeep_core::submission::{
    AgreementAuditEntry, AgreementStore, CollaboratorError, SignatureRecord,
};

use super::{AgreementRepository, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct SqlAgreementRepository {
    pool: DbPool,
}

impl SqlAgreementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Accepts the agreement and writes its audit entry and signature in one
    /// transaction. Nothing is kept if any of the three writes fails.
    pub async fn accept_with_records(
        &self,
        accepted_at: DateTime<Utc>,
        entry: &AgreementAuditEntry,
        signature: &SignatureRecord,
    ) -> Result<(), RepositoryError> {
        let id = &entry.agreement_id;
        let mut tx = self.pool.begin().await?;

        if update_accepted(&mut tx, id, accepted_at).await? == 0 {
            tx.rollback().await?;
            return Err(self.not_acceptable(id).await);
        }
        insert_audit(&mut tx, entry).await?;
        insert_signature(&mut tx, signature).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn current_status(&self, id: &AgreementId) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT status FROM service_agreement WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row.try_get::<String, _>("status").map_err(decode)).transpose()
    }

    async fn not_acceptable(&self, id: &AgreementId) -> RepositoryError {
        match self.current_status(id).await {
            Ok(Some(status)) => RepositoryError::Conflict { id: id.0.clone(), status },
            Ok(None) => RepositoryError::NotFound(id.0.clone()),
            Err(error) => error,
        }
    }
}

async fn update_accepted(
    conn: &mut SqliteConnection,
    id: &AgreementId,
    accepted_at: DateTime<Utc>,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE service_agreement
         SET status = 'accepted', accepted_at = ?, updated_at = ?
         WHERE id = ? AND status IN ('draft', 'sent', 'opened')",
    )
    .bind(accepted_at.to_rfc3339())
    .bind(Utc::now().to_rfc3339())
    .bind(&id.0)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

async fn insert_audit(
    conn: &mut SqliteConnection,
    entry: &AgreementAuditEntry,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO agreement_audit_log (agreement_id, action, actor, detail,
                                          correlation_id, recorded_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&entry.agreement_id.0)
    .bind(&entry.action)
    .bind(&entry.actor)
    .bind(&entry.detail)
    .bind(&entry.correlation_id)
    .bind(entry.recorded_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn insert_signature(
    conn: &mut SqliteConnection,
    record: &SignatureRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO agreement_signature (agreement_id, signatory_name, signatory_position,
                                          signature_data, signed_on, document_location,
                                          created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.agreement_id.0)
    .bind(&record.signatory_name)
    .bind(&record.signatory_position)
    .bind(&record.signature_data)
    .bind(record.signed_on.format(DATE_FORMAT).to_string())
    .bind(&record.document_location)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn decode(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn parse_date(column: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

fn row_to_agreement(row: &sqlx::sqlite::SqliteRow) -> Result<ServiceAgreement, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let customer_json: String = row.try_get("customer_json").map_err(decode)?;
    let proposal_expiry: String = row.try_get("proposal_expiry").map_err(decode)?;
    let contract_start: String = row.try_get("contract_start").map_err(decode)?;
    let contract_end: String = row.try_get("contract_end").map_err(decode)?;
    let incentives: i64 = row.try_get("incentives").map_err(decode)?;
    let sites_json: String = row.try_get("sites_json").map_err(decode)?;

    let status = AgreementStatus::parse(&status_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown agreement status `{status_str}`"))
    })?;
    let customer: CustomerSnapshot = serde_json::from_str(&customer_json).map_err(decode)?;
    let sites: Vec<Site> = serde_json::from_str(&sites_json).map_err(decode)?;

    Ok(ServiceAgreement {
        id: AgreementId(id),
        status,
        customer,
        proposal_expiry: parse_date("proposal_expiry", &proposal_expiry)?,
        contract_start: parse_date("contract_start", &contract_start)?,
        contract_end: parse_date("contract_end", &contract_end)?,
        incentives: incentives != 0,
        sites,
    })
}

fn row_to_audit(row: &sqlx::sqlite::SqliteRow) -> Result<AgreementAuditEntry, RepositoryError> {
    let recorded_at: String = row.try_get("recorded_at").map_err(decode)?;
    Ok(AgreementAuditEntry {
        agreement_id: AgreementId(row.try_get("agreement_id").map_err(decode)?),
        action: row.try_get("action").map_err(decode)?,
        actor: row.try_get("actor").map_err(decode)?,
        detail: row.try_get("detail").map_err(decode)?,
        correlation_id: row.try_get("correlation_id").map_err(decode)?,
        recorded_at: parse_timestamp("recorded_at", &recorded_at)?,
    })
}

#[async_trait]
impl AgreementRepository for SqlAgreementRepository {
    async fn find_by_id(
        &self,
        id: &AgreementId,
    ) -> Result<Option<ServiceAgreement>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, status, customer_json, proposal_expiry, contract_start, contract_end,
                    incentives, sites_json
             FROM service_agreement WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_agreement(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, agreement: &ServiceAgreement) -> Result<(), RepositoryError> {
        let customer_json = serde_json::to_string(&agreement.customer).map_err(decode)?;
        let sites_json = serde_json::to_string(&agreement.sites).map_err(decode)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO service_agreement (id, status, customer_json, proposal_expiry,
                                            contract_start, contract_end, incentives, sites_json,
                                            created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 customer_json = excluded.customer_json,
                 proposal_expiry = excluded.proposal_expiry,
                 contract_start = excluded.contract_start,
                 contract_end = excluded.contract_end,
                 incentives = excluded.incentives,
                 sites_json = excluded.sites_json,
                 updated_at = excluded.updated_at",
        )
        .bind(&agreement.id.0)
        .bind(agreement.status.as_str())
        .bind(customer_json)
        .bind(agreement.proposal_expiry.format(DATE_FORMAT).to_string())
        .bind(agreement.contract_start.format(DATE_FORMAT).to_string())
        .bind(agreement.contract_end.format(DATE_FORMAT).to_string())
        .bind(i64::from(agreement.incentives))
        .bind(sites_json)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "UPDATE service_agreement
             SET status = 'opened', opened_at = ?, updated_at = ?
             WHERE id = ? AND status IN ('draft', 'sent')",
        )
        .bind(&now)
        .bind(&now)
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_accepted(
        &self,
        id: &AgreementId,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let updated = update_accepted(&mut conn, id, accepted_at).await?;
        drop(conn);

        if updated > 0 {
            return Ok(());
        }
        Err(self.not_acceptable(id).await)
    }

    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_audit(&mut conn, entry).await
    }

    async fn list_audit(
        &self,
        id: &AgreementId,
    ) -> Result<Vec<AgreementAuditEntry>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT agreement_id, action, actor, detail, correlation_id, recorded_at
             FROM agreement_audit_log WHERE agreement_id = ? ORDER BY id ASC",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_audit).collect::<Result<Vec<_>, _>>()
    }

    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_signature(&mut conn, record).await
    }

    async fn find_signature(
        &self,
        id: &AgreementId,
    ) -> Result<Option<SignatureRecord>, RepositoryError> {
        let row = sqlx::query(
            "SELECT agreement_id, signatory_name, signatory_position, signature_data, signed_on,
                    document_location
             FROM agreement_signature WHERE agreement_id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let signed_on: String = row.try_get("signed_on").map_err(decode)?;
        Ok(Some(SignatureRecord {
            agreement_id: AgreementId(row.try_get("agreement_id").map_err(decode)?),
            signatory_name: row.try_get("signatory_name").map_err(decode)?,
            signatory_position: row.try_get("signatory_position").map_err(decode)?,
            signature_data: row.try_get("signature_data").map_err(decode)?,
            signed_on: parse_date("signed_on", &signed_on)?,
            document_location: row.try_get("document_location").map_err(decode)?,
        }))
    }
}

#[async_trait]
impl AgreementStore for SqlAgreementRepository {
    async fn load(&self, id: &AgreementId) -> Result<Option<ServiceAgreement>, CollaboratorError> {
        Ok(AgreementRepository::find_by_id(self, id).await?)
    }

    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, CollaboratorError> {
        Ok(AgreementRepository::mark_opened(self, id).await?)
    }

    async fn mark_accepted(
        &self,
        id: &AgreementId,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::mark_accepted(self, id, accepted_at).await?)
    }

    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::append_audit(self, entry).await?)
    }

    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::save_signature(self, record).await?)
    }

    async fn record_acceptance(
        &self,
        accepted_at: DateTime<Utc>,
        entry: &AgreementAuditEntry,
        signature: &SignatureRecord,
    ) -> Result<(), CollaboratorError> {
        Ok(self.accept_with_records(accepted_at, entry, signature).await?)
    }
}
