use serde::Serialize;
use upkeep_core::config::{AppConfig, LoadOptions};
use upkeep_db::{connect_with_settings, ping};

use crate::commands::block_on;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 4] =
    ["agreement_timezone", "document_templates", "email_delivery", "database_connectivity"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let checks = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_timezone(&config),
            check_templates(&config),
            check_email(&config),
            check_database_connectivity(&config),
        ],
        Err(error) => std::iter::once(DoctorCheck::fail("config_validation", error.to_string()))
            .chain(DEPENDENT_CHECKS.into_iter().map(DoctorCheck::skipped))
            .collect(),
    };

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_timezone(config: &AppConfig) -> DoctorCheck {
    DoctorCheck::pass(
        "agreement_timezone",
        format!(
            "`{}` resolves; today is {} for expiry checks",
            config.agreement.timezone.name(),
            config.agreement.today()
        ),
    )
}

fn check_templates(config: &AppConfig) -> DoctorCheck {
    let template_dir = &config.documents.template_dir;
    if template_dir.join("agreement.html.tera").is_file()
        || template_dir.join("agreement/agreement.html.tera").is_file()
    {
        DoctorCheck::pass(
            "document_templates",
            format!("agreement template found under `{}`", template_dir.display()),
        )
    } else {
        DoctorCheck::pass(
            "document_templates",
            format!(
                "no agreement template under `{}`; the built-in template will be used",
                template_dir.display()
            ),
        )
    }
}

fn check_email(config: &AppConfig) -> DoctorCheck {
    if !config.email.enabled {
        return DoctorCheck::pass("email_delivery", "disabled; confirmations are skipped");
    }

    match config.email.endpoint.as_deref() {
        Some(endpoint) if config.email.has_api_key() => {
            DoctorCheck::pass("email_delivery", format!("enabled via `{endpoint}`"))
        }
        Some(_) => DoctorCheck::fail("email_delivery", "enabled but email.api_key is not set"),
        None => DoctorCheck::fail("email_delivery", "enabled but email.endpoint is not set"),
    }
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let result = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let probe = ping(&pool).await.map_err(|error| format!("database ping failed: {error}"));
        pool.close().await;
        probe
    });

    match result {
        Ok(Ok(())) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        ),
        Ok(Err(error)) | Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
