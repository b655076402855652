//! Provider request construction
//!
//! Builds the chat-completion body for a [`Submission`]: model choice and
//! message shape depend on the effective input type.

use serde::Serialize;

use super::prompt::{render_instruction, IMAGE_CONTENT_PLACEHOLDER, INSTRUCTION_TEMPLATE};
use super::submission::{InputType, Submission};
use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// OpenRouter plugin switch, e.g. `{"id": "web"}` for search augmentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plugin {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Plugin>,
}

fn user_message(submission: &Submission) -> ChatMessage {
    let content = match submission.input_type {
        InputType::Image => MessageContent::Parts(vec![
            ContentPart::Text {
                text: render_instruction(InputType::Image, IMAGE_CONTENT_PLACEHOLDER),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: submission.input_content.clone(),
                },
            },
        ]),
        InputType::Text | InputType::Video => MessageContent::Text(render_instruction(
            submission.input_type,
            &submission.input_content,
        )),
    };
    ChatMessage {
        role: Role::User,
        content,
    }
}

/// Model used for a given input type.
pub fn model_for<'a>(settings: &'a Settings, input_type: InputType) -> &'a str {
    match input_type {
        InputType::Image => &settings.vision_model,
        InputType::Text | InputType::Video => &settings.text_model,
    }
}

pub fn build_provider_request(settings: &Settings, submission: &Submission) -> ProviderRequest {
    let plugins = if settings.web_search {
        vec![Plugin {
            id: "web".to_string(),
        }]
    } else {
        Vec::new()
    };

    ProviderRequest {
        model: model_for(settings, submission.input_type).to_string(),
        messages: vec![
            ChatMessage {
                role: Role::System,
                content: MessageContent::Text(INSTRUCTION_TEMPLATE.to_string()),
            },
            user_message(submission),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        plugins,
    }
}
