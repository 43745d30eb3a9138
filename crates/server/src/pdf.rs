//! Agreement document rendering.
//!
//! The signed agreement is rendered from a Tera template and converted with
//! `wkhtmltopdf` when it is on `PATH`. Without it the HTML itself is stored
//! as the artifact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tera::{Context, Tera};
use tokio::process::Command;
use tracing::{error, info, warn};

use upkeep_core::pricing::format_money;
use upkeep_core::submission::{
    AgreementDocument, CollaboratorError, DocumentRenderer, RenderedDocument,
};

pub const AGREEMENT_TEMPLATE: &str = "agreement.html.tera";

/// Registers the `money` filter: `summary.annual_total | money` renders
/// `$1,234.50`.
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = match value {
        tera::Value::String(raw) => Decimal::from_str(raw)
            .map_err(|e| tera::Error::msg(format!("money filter expects a decimal: {e}")))?,
        tera::Value::Number(n) => n
            .as_f64()
            .and_then(Decimal::from_f64_retain)
            .ok_or_else(|| tera::Error::msg("money filter expects a finite number"))?,
        tera::Value::Null => Decimal::ZERO,
        _ => return Err(tera::Error::msg("money filter expects a number")),
    };
    Ok(tera::Value::String(format_money(amount)))
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DocumentError> for CollaboratorError {
    fn from(value: DocumentError) -> Self {
        CollaboratorError::new(value.to_string())
    }
}

#[derive(Serialize)]
struct ServiceRow<'a> {
    label: &'a str,
    frequency: &'static str,
    visits_per_year: u32,
    annual_cost: Decimal,
}

#[derive(Clone, Debug)]
pub struct AgreementDocumentRenderer {
    tera: Tera,
    template_name: String,
    wkhtmltopdf_path: Option<PathBuf>,
    output_dir: PathBuf,
}

impl AgreementDocumentRenderer {
    /// Loads templates from `template_dir`, falling back to the built-in
    /// agreement template when the directory has none.
    pub fn new(template_dir: &Path, output_dir: &Path) -> Result<Self, DocumentError> {
        let pattern = format!("{}/**/*.tera", template_dir.display());
        let mut tera = Tera::new(&pattern).map_err(|e| DocumentError::Template(e.to_string()))?;
        let on_disk = tera
            .get_template_names()
            .filter(|name| name.ends_with(AGREEMENT_TEMPLATE))
            .min_by_key(|name| name.len())
            .map(str::to_string);
        if let Some(template_name) = on_disk {
            return Ok(Self::from_tera(tera, template_name, output_dir));
        }

        warn!(
            event_name = "system.documents.template_fallback",
            correlation_id = "bootstrap",
            agreement_id = "unknown",
            template_dir = %template_dir.display(),
            "agreement template not found on disk, using built-in template"
        );
        add_builtin_template(&mut tera)?;
        Ok(Self::from_tera(tera, AGREEMENT_TEMPLATE.to_string(), output_dir))
    }

    pub fn with_builtin_template(output_dir: &Path) -> Result<Self, DocumentError> {
        let mut tera = Tera::default();
        add_builtin_template(&mut tera)?;
        Ok(Self::from_tera(tera, AGREEMENT_TEMPLATE.to_string(), output_dir))
    }

    fn from_tera(mut tera: Tera, template_name: String, output_dir: &Path) -> Self {
        register_template_filters(&mut tera);
        tera.autoescape_on(vec![".html", ".html.tera"]);

        let wkhtmltopdf_path = which::which("wkhtmltopdf").ok();
        match &wkhtmltopdf_path {
            Some(path) => info!(path = %path.display(), "wkhtmltopdf found"),
            None => warn!("wkhtmltopdf not found in PATH - agreements will be stored as HTML"),
        }

        Self { tera, template_name, wkhtmltopdf_path, output_dir: output_dir.to_path_buf() }
    }

    /// Forces HTML artifacts regardless of what is installed.
    #[cfg(test)]
    pub fn without_pdf_conversion(mut self) -> Self {
        self.wkhtmltopdf_path = None;
        self
    }

    pub fn render_html(&self, document: &AgreementDocument<'_>) -> Result<String, DocumentError> {
        let services: Vec<ServiceRow<'_>> = document
            .summary
            .selected_services()
            .map(|service| ServiceRow {
                label: &service.label,
                frequency: service.frequency.label(),
                visits_per_year: service.visits_per_year,
                annual_cost: service.annual_cost,
            })
            .collect();

        let mut context = Context::new();
        context.insert("company_name", document.company_name);
        context.insert("agreement", document.agreement);
        context.insert("company", document.state.company());
        context.insert("billing", document.state.billing());
        context.insert("sites", document.state.sites());
        context.insert("services", &services);
        context.insert("summary", document.summary);
        context.insert("signature", document.state.signature());
        context.insert("signed_on", &document.signed_on.format("%-d %B %Y").to_string());

        self.tera
            .render(&self.template_name, &context)
            .map_err(|e| DocumentError::Template(e.to_string()))
    }

    async fn write_artifact(
        &self,
        file_name: String,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<RenderedDocument, DocumentError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(RenderedDocument {
            file_name,
            content_type: content_type.to_string(),
            location: path.display().to_string(),
            size_bytes: bytes.len(),
        })
    }

    async fn convert_html_to_pdf(
        &self,
        html: &str,
        wkhtmltopdf_path: &Path,
    ) -> Result<Vec<u8>, DocumentError> {
        let temp_dir = std::env::temp_dir();
        let stem = uuid::Uuid::new_v4().simple().to_string();
        let html_path = temp_dir.join(format!("agreement_{stem}.html"));
        let pdf_path = temp_dir.join(format!("agreement_{stem}.pdf"));

        tokio::fs::write(&html_path, html).await?;

        let output = Command::new(wkhtmltopdf_path)
            .args(["--page-size", "A4", "--encoding", "utf-8", "--quiet"])
            .args(["--margin-top", "10mm", "--margin-bottom", "10mm"])
            .args(["--margin-left", "10mm", "--margin-right", "10mm"])
            .arg(&html_path)
            .arg(&pdf_path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;
        let _ = tokio::fs::remove_file(&html_path).await;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(stderr = %stderr, "wkhtmltopdf failed");
            let _ = tokio::fs::remove_file(&pdf_path).await;
            return Err(DocumentError::Conversion(stderr.to_string()));
        }

        let pdf_bytes = tokio::fs::read(&pdf_path).await?;
        let _ = tokio::fs::remove_file(&pdf_path).await;
        Ok(pdf_bytes)
    }
}

fn add_builtin_template(tera: &mut Tera) -> Result<(), DocumentError> {
    tera.add_raw_template(
        AGREEMENT_TEMPLATE,
        include_str!("../../../templates/agreement/agreement.html.tera"),
    )
    .map_err(|e| DocumentError::Template(e.to_string()))
}

/// `SA-100` signed on 2026-10-18 becomes `SA-100-20261018`.
fn artifact_stem(document: &AgreementDocument<'_>) -> String {
    let id: String = document
        .agreement
        .id
        .0
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{id}-{}", document.signed_on.format("%Y%m%d"))
}

#[async_trait]
impl DocumentRenderer for AgreementDocumentRenderer {
    async fn render(
        &self,
        document: &AgreementDocument<'_>,
    ) -> Result<RenderedDocument, CollaboratorError> {
        let html = self.render_html(document)?;
        let stem = artifact_stem(document);

        if let Some(wkhtmltopdf) = &self.wkhtmltopdf_path {
            match self.convert_html_to_pdf(&html, wkhtmltopdf).await {
                Ok(pdf) => {
                    return Ok(self
                        .write_artifact(format!("{stem}.pdf"), "application/pdf", &pdf)
                        .await?);
                }
                Err(e) => warn!(error = %e, "PDF conversion failed, storing HTML instead"),
            }
        }

        Ok(self
            .write_artifact(format!("{stem}.html"), "text/html; charset=utf-8", html.as_bytes())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;

    use upkeep_core::submission::{AgreementDocument, DocumentRenderer};

    use super::{tera_money_filter, AgreementDocumentRenderer};
    use crate::fixtures::{agreement, completed_state};

    #[test]
    fn money_filter_formats_decimal_strings() {
        let formatted =
            tera_money_filter(&tera::Value::String("1234.5".to_string()), &HashMap::new())
                .expect("format");

        assert_eq!(formatted, tera::Value::String("$1,234.50".to_string()));
        assert!(tera_money_filter(&tera::Value::Bool(true), &HashMap::new()).is_err());
    }

    #[tokio::test]
    async fn stores_html_artifact_when_pdf_conversion_is_unavailable() {
        let output = tempfile::tempdir().expect("tempdir");
        let renderer = AgreementDocumentRenderer::with_builtin_template(output.path())
            .expect("template")
            .without_pdf_conversion();
        let agreement = agreement();
        let state = completed_state(&agreement);
        let summary = state.summary("AUD");

        let rendered = renderer
            .render(&AgreementDocument {
                company_name: "Upkeep Services",
                agreement: &agreement,
                state: &state,
                summary: &summary,
                signed_on: NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date"),
            })
            .await
            .expect("render");

        assert_eq!(rendered.file_name, "SA-200-20261018.html");
        assert!(rendered.content_type.starts_with("text/html"));
        let html = std::fs::read_to_string(&rendered.location).expect("artifact on disk");
        assert_eq!(html.len(), rendered.size_bytes);
        assert!(html.contains("SA-200"));
        assert!(html.contains("Harbour View Owners Corp"));
        assert!(html.contains("Chute Cleaning"));
        assert!(html.contains("$2,470.00"));
        assert!(html.contains("18 October 2026"));
    }

    #[test]
    fn loads_a_nested_agreement_template_from_disk() {
        let templates = tempfile::tempdir().expect("tempdir");
        let nested = templates.path().join("agreement");
        std::fs::create_dir_all(&nested).expect("template dir");
        std::fs::write(
            nested.join("agreement.html.tera"),
            "<p>{{ agreement.id }} {{ summary.annual_total | money }}</p>",
        )
        .expect("write template");
        let renderer =
            AgreementDocumentRenderer::new(templates.path(), templates.path()).expect("load");
        let agreement = agreement();
        let state = completed_state(&agreement);
        let summary = state.summary("AUD");

        let html = renderer
            .render_html(&AgreementDocument {
                company_name: "Upkeep Services",
                agreement: &agreement,
                state: &state,
                summary: &summary,
                signed_on: NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date"),
            })
            .expect("render");

        assert_eq!(html, "<p>SA-200 $2,470.00</p>");
    }

    #[test]
    fn customer_text_is_escaped() {
        let output = tempfile::tempdir().expect("tempdir");
        let renderer =
            AgreementDocumentRenderer::with_builtin_template(output.path()).expect("template");
        let agreement = agreement();
        let mut state = completed_state(&agreement);
        let mut company = state.company().clone();
        company.company_name = "<script>alert(1)</script>".to_string();
        state.update_company(company);
        let summary = state.summary("AUD");

        let html = renderer
            .render_html(&AgreementDocument {
                company_name: "Upkeep Services",
                agreement: &agreement,
                state: &state,
                summary: &summary,
                signed_on: NaiveDate::from_ymd_opt(2026, 10, 18).expect("valid date"),
            })
            .expect("render");

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }
}
