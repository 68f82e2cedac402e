use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

use crate::config::MailConfig;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("mail delivery is not configured")]
    NotConfigured,
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

impl DeliveryError {
    /// Transport errors and provider-side 5xx/429 responses may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            DeliveryError::NotConfigured => false,
            DeliveryError::Transport(_) => true,
            DeliveryError::Rejected { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

/// Out-of-band message delivery.
pub trait Mailer: Send + Sync {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<(), DeliveryError>>;
}

/// Sends through an HTTP mail API with bearer authentication.
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    config: MailConfig,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn post(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let payload = json!({
            "from": self.config.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
        });

        let response = self.client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("Mail provider accepted message to {}", email.to);
        Ok(())
    }
}

impl Mailer for HttpMailer {
    fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(self.post(email))
    }
}

/// Used when no mail provider is configured; every send fails permanently.
#[derive(Clone, Copy, Default)]
pub struct DisabledMailer;

impl Mailer for DisabledMailer {
    fn send<'a>(&'a self, _email: &'a OutboundEmail) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async { Err(DeliveryError::NotConfigured) })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every message and replays scripted failures before succeeding.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<OutboundEmail>>,
        pub failures: Mutex<VecDeque<DeliveryError>>,
    }

    impl RecordingMailer {
        pub fn failing_with(failures: Vec<DeliveryError>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failures: Mutex::new(failures.into()),
            }
        }

        pub fn sent_to(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|e| e.to.clone()).collect()
        }
    }

    impl Mailer for RecordingMailer {
        fn send<'a>(&'a self, email: &'a OutboundEmail) -> BoxFuture<'a, Result<(), DeliveryError>> {
            Box::pin(async move {
                if let Some(err) = self.failures.lock().unwrap().pop_front() {
                    return Err(err);
                }
                self.sent.lock().unwrap().push(email.clone());
                Ok(())
            })
        }
    }

    #[tokio::test]
    async fn test_disabled_mailer_fails_permanently() {
        let email = OutboundEmail {
            to: "a@example.com".to_string(),
            subject: "s".to_string(),
            html: "b".to_string(),
        };
        let err = DisabledMailer.send(&email).await.unwrap_err();
        assert!(matches!(err, DeliveryError::NotConfigured));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(DeliveryError::Rejected { status: 503, body: String::new() }.is_retryable());
        assert!(DeliveryError::Rejected { status: 429, body: String::new() }.is_retryable());
        assert!(!DeliveryError::Rejected { status: 422, body: String::new() }.is_retryable());
    }
}
