//! Slash and message command handlers.

use crate::interactions::CommandInvocation;
use rolelink_oauth2::{LinkError, LinkFlow};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// A reply destined for the user who ran the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingMessage {
    pub content: String,
    pub ephemeral: bool,
}

impl UserFacingMessage {
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: true,
        }
    }

    /// Visible to everyone in the channel.
    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ephemeral: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid options provided")]
    InvalidOptions,

    #[error("Could not determine the target user")]
    UnknownTarget,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Failed to update attributes: {0}")]
    Update(#[source] LinkError),

    #[error("Failed to read attributes: {0}")]
    Read(#[source] LinkError),

    #[error("Failed to generate authorization link: {0}")]
    LinkGeneration(#[source] LinkError),
}

impl CommandError {
    /// What the user sees. Internal details stay in the logs.
    pub fn to_user_message(&self) -> UserFacingMessage {
        let content = match self {
            CommandError::InvalidOptions => "❌ Invalid options provided.",
            CommandError::UnknownTarget => "❌ Could not determine the user to check.",
            CommandError::UnknownCommand(_) => "❌ Unknown command.",
            CommandError::Update(_) => "❌ An error occurred while updating the database.",
            CommandError::Read(_) => "❌ An error occurred while fetching data from the database.",
            CommandError::LinkGeneration(_) => {
                "❌ An error occurred while generating the authorization link."
            }
        };
        UserFacingMessage::ephemeral(content)
    }
}

pub struct CommandHandler {
    flow: Arc<LinkFlow>,
    scopes: Vec<String>,
}

impl CommandHandler {
    pub fn new(flow: Arc<LinkFlow>, scopes: Vec<String>) -> Self {
        Self { flow, scopes }
    }

    #[instrument(skip(self, invocation), fields(command = %invocation.name))]
    pub async fn dispatch(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<UserFacingMessage, CommandError> {
        match invocation.name.as_str() {
            "set-assistant" => self.set_assistant(invocation).await,
            "view-assistant" => self.view_assistant(invocation).await,
            "link-role" => self.link_role().await,
            "Menu" => Ok(UserFacingMessage::public("Hey")),
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }

    async fn set_assistant(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<UserFacingMessage, CommandError> {
        let (Some(user), Some(status)) = (
            invocation.user_option("user"),
            invocation.string_option("status"),
        ) else {
            return Err(CommandError::InvalidOptions);
        };
        let is_assistant = status == "true";

        let written = self
            .flow
            .set_attribute(&user.id, is_assistant)
            .await
            .map_err(CommandError::Update)?;

        if !written {
            return Ok(UserFacingMessage::ephemeral(
                "❌ Failed to update the database. Please try again.",
            ));
        }

        Ok(UserFacingMessage::ephemeral(format!(
            "✅ Successfully set **{}**'s assistant status to **{}**.\n\n\
             ℹ️ The user needs to connect their linked role via OAuth \
             for this to take effect in Discord.\n\
             They can do this by using the `/link-role` command.",
            user.username, is_assistant
        )))
    }

    async fn view_assistant(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<UserFacingMessage, CommandError> {
        let target = invocation
            .user_option("user")
            .or_else(|| invocation.invoker.clone())
            .ok_or(CommandError::UnknownTarget)?;

        let record = self
            .flow
            .get_attribute(&target.id)
            .await
            .map_err(CommandError::Read)?;

        let content = match record {
            None => format!(
                "ℹ️ **{}** has no data in the database yet.\n\nDefault assistant status: **false**",
                target.username
            ),
            Some(record) => format!(
                "📊 **Assistant Status for {}**\n\n\
                 ✨ Is Assistant: **{}**\n\
                 🕒 Last Updated: {}\n\n\
                 ℹ️ This value is used for Discord linked roles.",
                target.username,
                if record.is_assistant { "Yes ✅" } else { "No ❌" },
                record.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
            ),
        };

        Ok(UserFacingMessage::ephemeral(content))
    }

    async fn link_role(&self) -> Result<UserFacingMessage, CommandError> {
        let request = self
            .flow
            .authorization_url(&self.scopes)
            .await
            .map_err(CommandError::LinkGeneration)?;

        Ok(UserFacingMessage::ephemeral(format!(
            "🔗 **Connect Your Linked Role**\n\n\
             Click the link below to authorize this app and update your linked role metadata:\n\n\
             {}\n\n\
             ℹ️ This will allow the app to update your role connection \
             based on your assistant status.\n\
             🔒 Your data is secure and only used for linked roles.",
            request.url
        )))
    }
}
