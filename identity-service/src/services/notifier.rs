use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use service_core::error::AppError;
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::models::OrgInvite;

/// Delivers org invites to their invitee.
#[async_trait]
pub trait InviteNotifier: Send + Sync {
    async fn send_invite(&self, invite: &OrgInvite, link: &str) -> Result<(), AppError>;
}

/// Link the invitee follows to respond: `base_url + redirect_path?invite=<id>`.
pub fn invite_link(base_url: &str, redirect_path: &str, invite: &OrgInvite) -> String {
    format!(
        "{}{}?invite={}",
        base_url.trim_end_matches('/'),
        redirect_path,
        invite.id
    )
}

#[derive(Clone)]
pub struct SmtpNotifier {
    mailer: SmtpTransport,
    from_email: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, AppError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AppError::InternalError(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .port(587)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "Invite notifier initialized with SMTP");

        Ok(Self {
            mailer,
            from_email: config.from.clone(),
        })
    }
}

#[async_trait]
impl InviteNotifier for SmtpNotifier {
    async fn send_invite(&self, invite: &OrgInvite, link: &str) -> Result<(), AppError> {
        let subject = format!("You have been invited to join {}", invite.org_name);

        let html_body = format!(
            r###"            <html>
                <body style="font-family: Arial, sans-serif;">
                    <h2>Join {org} as {role}</h2>
                    <p>{inviter} invited you to join <strong>{org}</strong>.</p>
                    <p>
                        <a href="{link}" style="background-color: #4CAF50; color: white; padding: 14px 20px; text-decoration: none; border-radius: 4px;">
                            View invitation
                        </a>
                    </p>
                    <p style="color: #666; font-size: 12px;">
                        This invitation expires on {expires}. If you were not expecting it, you can ignore this email.
                    </p>
                </body>
            </html>
            "###,
            org = invite.org_name,
            role = invite.invitee_role,
            inviter = invite.inviter_email,
            link = link,
            expires = invite.expires_at.format("%Y-%m-%d %H:%M UTC"),
        );

        let plain_body = format!(
            "{} invited you to join {} as {}.\n\nRespond here: {}\n\nThis invitation expires on {}.",
            invite.inviter_email,
            invite.org_name,
            invite.invitee_role,
            link,
            invite.expires_at.format("%Y-%m-%d %H:%M UTC"),
        );

        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AppError::InternalError(e.into()))?,
            )
            .to(invite
                .invitee_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AppError::BadRequest(e.into()))?)
            .subject(subject)
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(plain_body),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        // SmtpTransport blocks
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::InternalError(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(invite_id = %invite.id, to = %invite.invitee_email, "Invite email sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    invite_id = %invite.id,
                    "Failed to send invite email"
                );
                Err(AppError::EmailError(e.to_string()))
            }
        }
    }
}

/// Logs invites instead of mailing them; used when no SMTP relay is set.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl InviteNotifier for LogNotifier {
    async fn send_invite(&self, invite: &OrgInvite, link: &str) -> Result<(), AppError> {
        tracing::info!(
            invite_id = %invite.id,
            to = %invite.invitee_email,
            link,
            "Invite created (email delivery disabled)"
        );
        Ok(())
    }
}

/// Records every delivery; can be told to fail.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// `(invitee email, link)` pairs delivered so far.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl InviteNotifier for MockNotifier {
    async fn send_invite(&self, invite: &OrgInvite, link: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::EmailError("mock delivery failure".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((invite.invitee_email.clone(), link.to_string()));
        }
        Ok(())
    }
}
