use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::validation::{validate_not_blank, validate_username},
    state::{
        question::QuestionId,
        session::{Player, PlayerId},
    },
};

/// One chat update forwarded by a transport adapter.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommandRequest {
    /// Stable platform identifier of the sender.
    pub player_id: PlayerId,
    /// Current display name of the sender.
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub display_name: String,
    /// Platform handle of the sender, without `@`.
    #[serde(default)]
    #[validate(custom(function = "validate_username"))]
    pub username: Option<String>,
    /// Command text, e.g. `/start` or `answer:Paris`.
    #[validate(length(min = 1, max = 4096), custom(function = "validate_not_blank"))]
    pub text: String,
    /// Question the answer button belonged to.
    #[serde(default)]
    pub question_id: Option<QuestionId>,
}

impl CommandRequest {
    /// Player described by the request.
    pub fn player(&self) -> Player {
        let player = Player::new(self.player_id, self.display_name.trim());
        match &self.username {
            Some(username) => player.with_username(username.clone()),
            None => player,
        }
    }
}
