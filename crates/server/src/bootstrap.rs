use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use upkeep_core::audit::{AuditSink, TracingAuditSink};
use upkeep_core::config::{AppConfig, ConfigError, LoadOptions};
use upkeep_core::submission::{CollaboratorError, SubmissionPipeline, SubmissionSettings};
use upkeep_db::{connect_with_settings, migrations, DbPool, SqlAgreementRepository};

use crate::email::Mailer;
use crate::health::HealthState;
use crate::pdf::{AgreementDocumentRenderer, DocumentError};
use crate::portal::PortalState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub portal: PortalState,
}

impl Application {
    pub fn health_state(&self) -> HealthState {
        HealthState::new(self.db_pool.clone(), self.config.documents.output_dir.clone())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("document renderer failed to initialise: {0}")]
    Documents(#[from] DocumentError),
    #[error("email delivery failed to initialise: {0}")]
    Email(#[source] CollaboratorError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        agreement_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        agreement_id = "unknown",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        agreement_id = "unknown",
        "database migrations applied"
    );

    let renderer = if config.documents.template_dir.is_dir() {
        AgreementDocumentRenderer::new(
            &config.documents.template_dir,
            &config.documents.output_dir,
        )?
    } else {
        warn!(
            event_name = "system.bootstrap.template_dir_missing",
            correlation_id = "bootstrap",
            agreement_id = "unknown",
            template_dir = %config.documents.template_dir.display(),
            "template directory missing, using built-in agreement template"
        );
        AgreementDocumentRenderer::with_builtin_template(&config.documents.output_dir)?
    };

    let mailer = Mailer::from_config(&config.email).map_err(BootstrapError::Email)?;
    info!(
        event_name = "system.bootstrap.email_configured",
        correlation_id = "bootstrap",
        agreement_id = "unknown",
        email_enabled = mailer.is_enabled(),
        "confirmation email delivery configured"
    );

    let settings = SubmissionSettings {
        company_name: config.agreement.company_name.clone(),
        currency: config.agreement.currency.clone(),
        email_enabled: mailer.is_enabled(),
        internal_recipient: config.email.internal_recipient.clone(),
    };
    let audit_sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let pipeline =
        SubmissionPipeline::new(
            renderer,
            mailer,
            SqlAgreementRepository::new(db_pool.clone()),
            settings,
        )
            .with_audit_sink(audit_sink);
    let portal = PortalState::new(pipeline, config.agreement.clone());

    Ok(Application { config, db_pool, portal })
}

#[cfg(test)]
mod tests {
    use upkeep_core::config::{ConfigOverrides, LoadOptions};
    use upkeep_db::{AgreementRepository, SqlAgreementRepository};

    use crate::bootstrap::bootstrap;
    use crate::fixtures::agreement;

    fn options(database_url: &str, output_dir: std::path::PathBuf) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                output_dir: Some(output_dir),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_unknown_timezone() {
        let output = tempfile::tempdir().expect("tempdir");
        let mut options = options("sqlite::memory:", output.path().to_path_buf());
        options.overrides.timezone = Some("Mars/Olympus_Mons".to_string());

        let error = bootstrap(options).await.err().expect("invalid timezone");

        assert!(error.to_string().contains("timezone"));
    }

    #[tokio::test]
    async fn bootstrap_applies_migrations_and_wires_the_agreement_store() {
        let output = tempfile::tempdir().expect("tempdir");
        let database_url =
            format!("sqlite://{}?mode=rwc", output.path().join("upkeep.db").display());
        let app = bootstrap(options(&database_url, output.path().join("agreements")))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('service_agreement', 'agreement_audit_log', 'agreement_signature')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 3);

        let repo = SqlAgreementRepository::new(app.db_pool.clone());
        repo.save(&agreement()).await.expect("save");
        assert!(repo.find_by_id(&agreement().id).await.expect("find").is_some());

        app.db_pool.close().await;
    }
}
