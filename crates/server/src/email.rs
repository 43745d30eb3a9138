//! Confirmation email delivery through an HTTP mail API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

use upkeep_core::config::EmailConfig;
use upkeep_core::submission::{CollaboratorError, ConfirmationEmail, ConfirmationMailer};

#[derive(Serialize)]
struct OutboundAttachment<'a> {
    file_name: &'a str,
    content_type: &'a str,
    location: &'a str,
}

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<&'a str>,
    subject: &'a str,
    text: &'a str,
    attachments: [OutboundAttachment<'a>; 1],
}

pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: SecretString,
    from_address: String,
}

impl HttpMailer {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        from_address: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CollaboratorError::new(format!("mail client: {error}")))?;
        Ok(Self { client, endpoint: endpoint.into(), api_key, from_address: from_address.into() })
    }
}

#[async_trait]
impl ConfirmationMailer for HttpMailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), CollaboratorError> {
        let message = OutboundMessage {
            from: &self.from_address,
            to: &email.to,
            cc: email.cc.as_deref(),
            subject: &email.subject,
            text: &email.body,
            attachments: [OutboundAttachment {
                file_name: &email.attachment.file_name,
                content_type: &email.attachment.content_type,
                location: &email.attachment.location,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(|error| CollaboratorError::new(format!("mail request failed: {error}")))?;

        if !response.status().is_success() {
            return Err(CollaboratorError::new(format!(
                "mail endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Mail delivery selected from config. `Disabled` only logs, so the
/// pipeline can run where no mail API is configured.
pub enum Mailer {
    Http(HttpMailer),
    Disabled,
}

impl Mailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, CollaboratorError> {
        match (config.enabled, config.endpoint.as_deref(), config.api_key.as_ref()) {
            (true, Some(endpoint), Some(api_key)) => Ok(Self::Http(HttpMailer::new(
                endpoint,
                api_key.clone(),
                config.from_address.clone(),
                Duration::from_secs(config.timeout_secs.max(1)),
            )?)),
            _ => Ok(Self::Disabled),
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

#[async_trait]
impl ConfirmationMailer for Mailer {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), CollaboratorError> {
        match self {
            Self::Http(mailer) => mailer.send(email).await,
            Self::Disabled => {
                info!(
                    event_name = "agreement.email.skipped",
                    recipient = %email.to,
                    subject = %email.subject,
                    "email delivery disabled; confirmation not sent"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use secrecy::SecretString;
    use serde_json::Value;

    use upkeep_core::config::AppConfig;
    use upkeep_core::submission::{ConfirmationEmail, ConfirmationMailer, RenderedDocument};

    use super::{HttpMailer, Mailer};

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn spawn_mail_api(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/send",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_string);
                        captured.lock().expect("lock").push((auth, body));
                        status
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{address}/send"), captured)
    }

    fn email() -> ConfirmationEmail {
        ConfirmationEmail {
            to: "priya@example.com".to_string(),
            cc: Some("office@upkeep.example".to_string()),
            subject: "Upkeep Services service agreement SA-200".to_string(),
            body: "Thank you".to_string(),
            attachment: RenderedDocument {
                file_name: "SA-200-20261018.html".to_string(),
                content_type: "text/html; charset=utf-8".to_string(),
                location: "artifacts/agreements/SA-200-20261018.html".to_string(),
                size_bytes: 42,
            },
        }
    }

    #[tokio::test]
    async fn posts_message_with_bearer_token() {
        let (endpoint, captured) = spawn_mail_api(StatusCode::ACCEPTED).await;
        let mailer = HttpMailer::new(
            endpoint,
            SecretString::from("mail-key".to_string()),
            "agreements@upkeep.example",
            Duration::from_secs(5),
        )
        .expect("client");

        mailer.send(&email()).await.expect("send");

        let captured = captured.lock().expect("lock");
        assert_eq!(captured.len(), 1);
        let (auth, body) = &captured[0];
        assert_eq!(auth.as_deref(), Some("Bearer mail-key"));
        assert_eq!(body["to"], "priya@example.com");
        assert_eq!(body["cc"], "office@upkeep.example");
        assert_eq!(body["attachments"][0]["file_name"], "SA-200-20261018.html");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (endpoint, _) = spawn_mail_api(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mailer = HttpMailer::new(
            endpoint,
            SecretString::from("mail-key".to_string()),
            "agreements@upkeep.example",
            Duration::from_secs(5),
        )
        .expect("client");

        let error = mailer.send(&email()).await.expect_err("server error");

        assert!(error.0.contains("500"));
    }

    #[tokio::test]
    async fn disabled_config_selects_log_only_delivery() {
        let mailer = Mailer::from_config(&AppConfig::default().email).expect("mailer");

        assert!(!mailer.is_enabled());
        mailer.send(&email()).await.expect("log-only send succeeds");
    }
}
