pub mod credentials;
pub mod mailer;

pub use credentials::{CredentialProvider, EnvCredentialProvider, FileCredentialProvider, MailCredentials};
pub use mailer::{MailTransport, OutgoingMail, SmtpMailer};

use crate::core::config::{AuthorEntry, NotificationConfig};
use crate::core::error::QmError;
use crate::core::orchestrator::SweepReport;
use crate::core::workspace::SvnWorkspace;
use std::collections::HashMap;
use std::sync::Arc;

/// Who receives the sweep email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

/// Maps version-control user names to recipients.
#[derive(Debug, Clone)]
pub struct AuthorDirectory {
    authors: HashMap<String, Recipient>,
    fallback: Recipient,
}

impl AuthorDirectory {
    /// Fails when `fallback_id` is not one of `authors`.
    pub fn new(authors: &[AuthorEntry], fallback_id: &str) -> Result<Self, QmError> {
        let authors: HashMap<String, Recipient> = authors
            .iter()
            .map(|entry| {
                (
                    entry.id.clone(),
                    Recipient {
                        name: entry.name.clone(),
                        email: entry.email.clone(),
                    },
                )
            })
            .collect();
        let fallback = authors.get(fallback_id).cloned().ok_or_else(|| {
            QmError::Config(format!(
                "fallback author '{}' is not in the author table",
                fallback_id
            ))
        })?;
        Ok(AuthorDirectory { authors, fallback })
    }

    pub fn resolve(&self, author: &str) -> &Recipient {
        match self.authors.get(author.trim()) {
            Some(recipient) => recipient,
            None => {
                tracing::info!(author, fallback = %self.fallback.email, "unknown contributor, using fallback owner");
                &self.fallback
            }
        }
    }
}

/// Static parts of the email.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub dashboard_url: String,
    pub archive_share: Option<String>,
}

impl MessageTemplate {
    pub fn from_config(config: &NotificationConfig) -> Self {
        MessageTemplate {
            dashboard_url: config.dashboard_url.clone(),
            archive_share: config.archive_share.clone(),
        }
    }

    pub fn subject(&self, revision: u64) -> String {
        format!("FarmDyn QM results for revision {} are ready!", revision)
    }

    pub fn html_body(&self, recipient: &Recipient, revision: u64, report: Option<&SweepReport>) -> String {
        let mut body = format!(
            "Hi {name}!<br>\n\
             Thanks for contributing to FarmDyn :)<br>\n\
             You can find the results of the batch compilation and execution tests at the following website:<br>\n\
             <a href=\"{url}\">{url}</a><br>\n",
            name = escape_html(&recipient.name),
            url = escape_html(&self.dashboard_url),
        );

        if let Some(share) = &self.archive_share {
            let folder = format!("{}\\{}", share.trim_end_matches('\\'), revision);
            body.push_str(&format!(
                "Furthermore, the listing and include files are stored in the following folder:<br>\n\
                 <a href='{folder}'>{folder}</a><br>\n",
                folder = escape_html(&folder),
            ));
        }

        if let Some(report) = report {
            body.push_str("<br>\nBatch status:<br>\n<ul>\n");
            for run in &report.runs {
                body.push_str(&format!(
                    "<li>{}: {}</li>\n",
                    escape_html(&run.key.batch_name),
                    escape_html(&run.status_line())
                ));
            }
            body.push_str("</ul>\n");
        }
        body
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Emails the last contributor once a sweep is done.
pub struct Notifier {
    workspace: SvnWorkspace,
    directory: AuthorDirectory,
    template: MessageTemplate,
    credentials: Arc<dyn CredentialProvider>,
    transport: Arc<dyn MailTransport>,
}

impl Notifier {
    pub fn new(
        workspace: SvnWorkspace,
        directory: AuthorDirectory,
        template: MessageTemplate,
        credentials: Arc<dyn CredentialProvider>,
        transport: Arc<dyn MailTransport>,
    ) -> Self {
        Notifier {
            workspace,
            directory,
            template,
            credentials,
            transport,
        }
    }

    /// Build the email for `revision` without sending it.
    pub async fn compose(
        &self,
        revision: u64,
        report: Option<&SweepReport>,
        sender: &str,
    ) -> Result<OutgoingMail, QmError> {
        let author = self.workspace.last_changed_author(revision).await?;
        let recipient = self.directory.resolve(&author);

        Ok(OutgoingMail {
            from: sender.to_string(),
            to: recipient.email.clone(),
            subject: self.template.subject(revision),
            html_body: self.template.html_body(recipient, revision, report),
        })
    }

    pub async fn notify(&self, revision: u64, report: Option<&SweepReport>) -> Result<(), QmError> {
        let credentials = self.credentials.credentials()?;
        let mail = self.compose(revision, report, &credentials.user).await?;
        self.transport.send(&mail, &credentials).await?;
        tracing::info!(revision, to = %mail.to, "notification sent");
        Ok(())
    }
}
