use async_trait::async_trait;
use tracing::info;

use crate::error::MessagingError;

/// Longest body the SMS provider accepts
pub const MAX_MESSAGE_LENGTH: usize = 1600;

/// Outbound text messaging
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), MessagingError>;
}

/// Credentials and endpoint of a Twilio account
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
    pub api_base: String,
}

/// Sends SMS through the Twilio REST API
pub struct TwilioMessenger {
    client: reqwest::Client,
    credentials: TwilioCredentials,
}

impl TwilioMessenger {
    pub fn new(credentials: TwilioCredentials) -> Self {
        Self { client: reqwest::Client::new(), credentials }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.credentials.api_base.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

fn check_message(phone: &str, message: &str) -> Result<(), MessagingError> {
    if phone.trim().is_empty() {
        return Err(MessagingError::InvalidMessage("recipient phone is empty".to_string()));
    }
    if message.trim().is_empty() {
        return Err(MessagingError::InvalidMessage("message body is empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(MessagingError::InvalidMessage(format!(
            "message longer than {MAX_MESSAGE_LENGTH} characters"
        )));
    }
    Ok(())
}

#[async_trait]
impl Messenger for TwilioMessenger {
    async fn send(&self, phone: &str, message: &str) -> Result<(), MessagingError> {
        check_message(phone, message)?;

        let form = [
            ("From", self.credentials.from_phone.as_str()),
            ("To", phone.trim()),
            ("Body", message),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.credentials.account_sid, Some(&self.credentials.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(MessagingError::Rejected { status: status.as_u16(), body })
        }
    }
}

/// Writes alerts to the tracing log instead of sending them
#[derive(Debug, Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send(&self, phone: &str, message: &str) -> Result<(), MessagingError> {
        check_message(phone, message)?;
        info!(phone = %phone, "{}", message);
        Ok(())
    }
}
