//! Outbound user notifications. Delivery is pluggable; the default
//! implementation writes the message to the log.

use async_trait::async_trait;
use std::sync::Mutex;

/// Message language. Norwegian variants share one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    English,
    Norwegian,
}

impl Language {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::to_lowercase).as_deref() {
            Some("nb" | "nn" | "no") => Language::Norwegian,
            _ => Language::English,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Registration,
    PasswordReset,
    ResetCode,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Token or code carried by the message.
    pub secret: String,
}

impl Notification {
    fn registration(to: &str, token: &str, base_url: &str) -> Self {
        Self {
            kind: NotificationKind::Registration,
            to: to.to_string(),
            subject: "Confirm your email".to_string(),
            body: format!(
                "Welcome! Confirm your email address: {}/register-user/{}",
                base_url.trim_end_matches('/'),
                token
            ),
            secret: token.to_string(),
        }
    }

    fn password_reset(to: &str, token: &str, base_url: &str) -> Self {
        Self {
            kind: NotificationKind::PasswordReset,
            to: to.to_string(),
            subject: "Reset password".to_string(),
            body: format!(
                "Reset your password: {}/reset-password/{}",
                base_url.trim_end_matches('/'),
                token
            ),
            secret: token.to_string(),
        }
    }

    fn reset_code(to: &str, code: &str, lang: Language) -> Self {
        let (subject, body) = match lang {
            Language::Norwegian => (
                "Tilbakestille passord",
                format!("Koden din for å tilbakestille passordet er {}", code),
            ),
            Language::English => (
                "Reset password",
                format!("Your password reset code is {}", code),
            ),
        };
        Self {
            kind: NotificationKind::ResetCode,
            to: to.to_string(),
            subject: subject.to_string(),
            body,
            secret: code.to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), anyhow::Error>;

    async fn send_registration(&self, to: &str, token: &str, base_url: &str) -> Result<(), anyhow::Error> {
        self.send(Notification::registration(to, token, base_url)).await
    }

    async fn send_password_reset(&self, to: &str, token: &str, base_url: &str) -> Result<(), anyhow::Error> {
        self.send(Notification::password_reset(to, token, base_url)).await
    }

    async fn send_reset_code(&self, to: &str, code: &str, lang: Language) -> Result<(), anyhow::Error> {
        self.send(Notification::reset_code(to, code, lang)).await
    }
}

/// Logs the envelope of every message. Secrets never reach the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), anyhow::Error> {
        tracing::info!(
            kind = ?notification.kind,
            to = %notification.to,
            subject = %notification.subject,
            "notification dispatched"
        );
        Ok(())
    }
}

/// Keeps every message in memory so tests can read tokens and codes back.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Secret of the most recent message of `kind` sent to `to`.
    pub fn last_secret(&self, to: &str, kind: NotificationKind) -> Option<String> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find(|n| n.to == to && n.kind == kind)
            .map(|n| n.secret.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), anyhow::Error> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification);
        Ok(())
    }
}
