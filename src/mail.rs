use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::MailConfig,
    error::{Error, Result},
    model::db::institution::Institution,
};

/// Outbound email client. When the SMTP credentials are not configured the
/// mailer still constructs, but every send reports a configuration error so
/// callers can decide whether that is fatal.
pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Option<Mailbox>,
}

impl Mailer {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let (user, pass) = match (&config.email_user, &config.email_pass) {
            (Some(user), Some(pass)) => (user.clone(), pass.clone()),
            _ => {
                return Ok(Self {
                    transport: None,
                    sender: None,
                })
            }
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(user.clone(), pass))
            .build();
        let sender = format!("Knot Admin <{user}>").parse::<Mailbox>()?;

        Ok(Self {
            transport: Some(transport),
            sender: Some(sender),
        })
    }

    /// Send the one-time approval notification inviting the institution to
    /// create its admin account.
    pub async fn send_approval_email(
        &self,
        institution: &Institution,
        frontend_url: &str,
    ) -> Result<()> {
        let (transport, sender) = match (&self.transport, &self.sender) {
            (Some(transport), Some(sender)) => (transport, sender),
            _ => {
                return Err(Error::Configuration(
                    "Email credentials are not set".to_string(),
                ))
            }
        };

        let registration_link = format!("{frontend_url}/register-admin/{}", institution.id);
        let body = format!(
            "Hello {},\n\n\
             Your institution registration has been approved!\n\n\
             Click the link below to create your admin account:\n\
             {registration_link}\n\n\
             Thank you!\n",
            institution.official_name
        );

        let message = Message::builder()
            .from(sender.clone())
            .to(institution.contact_email.parse::<Mailbox>()?)
            .subject("Institution Approved - Register Your Admin Account")
            .body(body)?;

        transport.send(message).await?;
        Ok(())
    }
}
