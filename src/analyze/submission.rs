//! Submission parsing
//!
//! Turns the inbound form (multipart or url-encoded) into a [`Submission`]:
//! the effective input type plus the content the model will see.

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};

pub const FIELD_INPUT_TYPE: &str = "input_type";
pub const FIELD_INPUT_CONTENT: &str = "input_content";
pub const FIELD_IMAGE: &str = "image";

const MISSING_INPUT: &str = "Missing 'input_type' or 'input_content'";
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Text,
    Image,
    Video,
}

impl InputType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Some(InputType::Text),
            "image" => Some(InputType::Image),
            "video" => Some(InputType::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputType::Text => "text",
            InputType::Image => "image",
            InputType::Video => "video",
        }
    }
}

impl std::fmt::Display for InputType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An uploaded file from the `image` form field.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    /// `data:<media type>;base64,<payload>`
    pub fn to_data_uri(&self) -> String {
        let media_type = self
            .media_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(FALLBACK_MEDIA_TYPE);
        format!(
            "data:{};base64,{}",
            media_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

fn multipart_error(e: MultipartError, what: &str) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge(format!("{}: {}", what, e.body_text()))
    } else {
        AppError::InvalidInput(format!("{}: {}", what, e.body_text()))
    }
}

/// Raw form input before normalisation.
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub input_type: Option<String>,
    pub input_content: Option<String>,
    pub image: Option<ImageUpload>,
}

impl FormInput {
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            input_type: fields.remove(FIELD_INPUT_TYPE),
            input_content: fields.remove(FIELD_INPUT_CONTENT),
            image: None,
        }
    }

    /// Read every part of a multipart body. Unknown fields are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut input = FormInput::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, "Malformed multipart body"))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                // Only file uploads count; a plain text part named `image` is ignored.
                FIELD_IMAGE if field.file_name().is_none() => {}
                FIELD_IMAGE => {
                    let media_type = field.content_type().map(|m| m.to_string());
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, "Failed to read image upload"))?;
                    // A file input left empty still posts a zero-length part.
                    if !bytes.is_empty() {
                        input.image = Some(ImageUpload {
                            media_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                FIELD_INPUT_TYPE | FIELD_INPUT_CONTENT => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(e, "Unreadable form field"))?;
                    if name == FIELD_INPUT_TYPE {
                        input.input_type = Some(text);
                    } else {
                        input.input_content = Some(text);
                    }
                }
                _ => {}
            }
        }
        Ok(input)
    }
}

/// The effective submission handed to the request builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub input_type: InputType,
    pub input_content: String,
}

impl Submission {
    /// Apply the normalisation rules: an uploaded image always wins and forces
    /// the type to `image`; otherwise both text fields must be present.
    pub fn resolve(input: FormInput) -> AppResult<Self> {
        if let Some(image) = input.image {
            return Ok(Submission {
                input_type: InputType::Image,
                input_content: image.to_data_uri(),
            });
        }

        let raw_type = input
            .input_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let content = input.input_content.filter(|c| !c.is_empty());

        let (Some(raw_type), Some(content)) = (raw_type, content) else {
            return Err(AppError::InvalidInput(MISSING_INPUT.to_string()));
        };

        let input_type = InputType::from_str(raw_type).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unsupported input_type '{}': expected text, image or video",
                raw_type
            ))
        })?;

        Ok(Submission {
            input_type,
            input_content: content,
        })
    }

    /// Short description for logs; never includes the content itself.
    pub fn summary(&self) -> String {
        format!("type={}, content_len={}", self.input_type, self.input_content.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_input(t: &str, c: &str) -> FormInput {
        FormInput {
            input_type: Some(t.to_string()),
            input_content: Some(c.to_string()),
            image: None,
        }
    }

    #[test]
    fn text_submission_resolves() {
        for t in ["text", "video", "image", " TEXT "] {
            let sub = Submission::resolve(text_input(t, "The moon is made of cheese")).unwrap();
            assert_eq!(sub.input_content, "The moon is made of cheese");
        }
        let sub = Submission::resolve(text_input("video", "https://video.test/x")).unwrap();
        assert_eq!(sub.input_type, InputType::Video);
    }

    #[test]
    fn missing_everything_is_invalid() {
        let err = Submission::resolve(FormInput::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m == MISSING_INPUT));
    }

    #[test]
    fn missing_type_or_empty_content_is_invalid() {
        let only_content = FormInput {
            input_content: Some("claim".to_string()),
            ..Default::default()
        };
        assert!(Submission::resolve(only_content).is_err());
        assert!(Submission::resolve(text_input("text", "")).is_err());
        assert!(Submission::resolve(text_input("", "claim")).is_err());
    }

    #[test]
    fn unknown_type_is_invalid() {
        let err = Submission::resolve(text_input("audio", "clip")).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(ref m) if m.contains("audio")));
    }

    #[test]
    fn image_upload_forces_image_type() {
        let input = FormInput {
            input_type: Some("text".to_string()),
            input_content: Some("ignored".to_string()),
            image: Some(ImageUpload {
                media_type: Some("image/png".to_string()),
                bytes: vec![0x89, b'P', b'N', b'G'],
            }),
        };
        let sub = Submission::resolve(input).unwrap();
        assert_eq!(sub.input_type, InputType::Image);
        assert_eq!(sub.input_content, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn data_uri_without_media_type() {
        let upload = ImageUpload {
            media_type: None,
            bytes: b"abc".to_vec(),
        };
        assert_eq!(upload.to_data_uri(), "data:application/octet-stream;base64,YWJj");
    }

    #[test]
    fn from_fields_picks_known_keys() {
        let fields = HashMap::from([
            ("input_type".to_string(), "text".to_string()),
            ("input_content".to_string(), "hello".to_string()),
            ("other".to_string(), "x".to_string()),
        ]);
        let input = FormInput::from_fields(fields);
        assert_eq!(input.input_type.as_deref(), Some("text"));
        assert_eq!(input.input_content.as_deref(), Some("hello"));
        assert!(input.image.is_none());
    }
}
