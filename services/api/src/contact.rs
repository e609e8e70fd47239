//! Contact form handling and the outbound mail relay

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::{
    error::ApiError,
    models::contact::{ContactRequest, OutgoingEmail},
    validation::validate_email,
};

/// Something able to deliver an outgoing email
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Mailer posting JSON messages to an HTTP relay
pub struct HttpRelayMailer {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpRelayMailer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build relay HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let mut request = self.client.post(&self.url).json(email);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .context("Relay request failed")?
            .error_for_status()
            .context("Relay rejected message")?;

        Ok(())
    }
}

/// Validates contact submissions and forwards them to the relay, if any
#[derive(Clone)]
pub struct ContactService {
    mailer: Option<Arc<dyn Mailer>>,
    recipient: String,
}

impl ContactService {
    pub fn new(mailer: Option<Arc<dyn Mailer>>, recipient: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient: recipient.into(),
        }
    }

    /// Accept a submission. Delivery problems never fail a valid submission.
    pub async fn submit(&self, request: &ContactRequest) -> Result<(), ApiError> {
        let name = request.name.trim();
        let email = request.email.trim();
        let subject = request.subject.trim();
        let message = request.message.trim();

        if [name, email, subject, message].iter().any(|f| f.is_empty()) {
            return Err(ApiError::BadRequest("All fields are required".to_string()));
        }
        validate_email(email).map_err(ApiError::BadRequest)?;

        info!("Contact form submission from {} <{}>: {}", name, email, subject);

        let Some(mailer) = &self.mailer else {
            info!("No mail relay configured, submission only logged");
            return Ok(());
        };

        let notification = OutgoingEmail {
            to: self.recipient.clone(),
            reply_to: Some(email.to_string()),
            subject: format!("New Contact Form Submission: {}", subject),
            text: format!(
                "Name: {}\nEmail: {}\nSubject: {}\n\nMessage:\n{}",
                name, email, subject, message
            ),
        };
        let confirmation = OutgoingEmail {
            to: email.to_string(),
            reply_to: None,
            subject: "Thank you for contacting us".to_string(),
            text: format!(
                "Dear {},\n\nThank you for reaching out. We have received your message \
                 regarding \"{}\" and will get back to you soon.",
                name, subject
            ),
        };

        for outgoing in [&notification, &confirmation] {
            if let Err(e) = mailer.send(outgoing).await {
                error!("Failed to relay contact email to {}: {:#}", outgoing.to, e);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            if self.fail {
                anyhow::bail!("relay down");
            }
            self.sent.lock().await.push(email.clone());
            Ok(())
        }
    }

    fn request(name: &str, email: &str, subject: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_missing_field_rejected() {
        let service = ContactService::new(None, "office@ngo.org");
        let result = service
            .submit(&request("Asha", "asha@example.org", "   ", "Hello"))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "All fields are required"));
    }

    #[tokio::test]
    async fn test_malformed_email_rejected() {
        let service = ContactService::new(None, "office@ngo.org");
        let result = service
            .submit(&request("Asha", "asha.example.org", "Volunteering", "Hello"))
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "Invalid email address"));
    }

    #[tokio::test]
    async fn test_valid_submission_sends_notification_and_confirmation() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = ContactService::new(Some(mailer.clone()), "office@ngo.org");

        service
            .submit(&request(" Asha ", "asha@example.org", "Volunteering", "Can I help?"))
            .await
            .expect("submission should succeed");

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "office@ngo.org");
        assert_eq!(sent[0].reply_to.as_deref(), Some("asha@example.org"));
        assert!(sent[0].text.contains("Can I help?"));
        assert_eq!(sent[1].to, "asha@example.org");
        assert!(sent[1].text.starts_with("Dear Asha,"));
    }

    #[tokio::test]
    async fn test_relay_failure_does_not_fail_submission() {
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let service = ContactService::new(Some(mailer), "office@ngo.org");

        let result = service
            .submit(&request("Asha", "asha@example.org", "Volunteering", "Hello"))
            .await;
        assert!(result.is_ok());
    }
}
