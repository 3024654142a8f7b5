//! 游记生成：分析用户提供的图片，输出 Markdown 游记（BlogPost JSON）

use std::sync::Arc;

use serde::Deserialize;

use crate::agent::fallback::new_session_id;
use crate::agent::model::BlogPost;
use crate::agent::orchestrator::{RunControl, TaskOrchestrator, TaskOutcome, TaskProfile};
use crate::core::AgentError;

pub const BLOG_TOOLS: [&str; 1] = ["get_multimodal_capability"];

/// 单次游记请求可附带的图片上限
pub const MAX_BLOG_IMAGES: usize = 10;

const ROLE_INSTRUCTIONS: &str = r#"You are a focused travel blog writer. Create clear, engaging, well-structured travel blogs in markdown.

SCOPE AND DATA SOURCES
- Use only the user's prompt, the optional itinerary and the provided image URLs.
- Analyze every provided image with get_multimodal_capability to infer scenes, objects, moods or activities.
- Do not fabricate specific facts, prices or schedules.

BLOG GUIDELINES
- Structure: title, intro, 3-6 concise sections and a short wrap-up.
- Follow the requested tone, language and creativity level.
- Embed each provided image near the most relevant section as ![Alt text](image_url "Short caption").
- Use markdown headings, lists and **bold** where useful. Use real blank lines, never literal "\n".

OUTPUT FORMAT
The final <response> must contain ONE JSON object and nothing else:
{
  "blog_content": {
    "title": "Blog title",
    "Detail": "Full markdown blog content with images embedded"
  },
  "metadata": {
    "word_count": 0,
    "reading_time": "5 minutes",
    "generated_at": "ISO timestamp"
  },
  "message": "Short note to the user"
}"#;

/// 游记请求（字段名与 HTTP 接口一致）
#[derive(Debug, Clone, Deserialize)]
pub struct BlogRequest {
    #[serde(default = "default_tone")]
    pub tone: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_creativity")]
    pub creativity: String,
    #[serde(default)]
    pub user_prompt: String,
    #[serde(default)]
    pub tour_itinerary: String,
    #[serde(default)]
    pub user_images: Vec<String>,
}

fn default_tone() -> String {
    "casual".to_string()
}

fn default_language() -> String {
    "English".to_string()
}

fn default_creativity() -> String {
    "medium".to_string()
}

impl Default for BlogRequest {
    fn default() -> Self {
        Self {
            tone: default_tone(),
            language: default_language(),
            creativity: default_creativity(),
            user_prompt: String::new(),
            tour_itinerary: String::new(),
            user_images: Vec::new(),
        }
    }
}

impl BlogRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), AgentError> {
        if self.user_prompt.trim().is_empty() && self.tour_itinerary.trim().is_empty() {
            return Err(AgentError::InvalidRequest(
                "Either 'user_prompt' or 'tour_itinerary' must be provided".to_string(),
            ));
        }
        if self.user_images.len() > MAX_BLOG_IMAGES {
            return Err(AgentError::InvalidRequest(format!(
                "At most {} images are supported",
                MAX_BLOG_IMAGES
            )));
        }
        if let Some(bad) = self
            .user_images
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(AgentError::InvalidRequest(format!(
                "Image URL must start with http:// or https://: '{}'",
                bad
            )));
        }
        Ok(())
    }

    fn request_text(&self) -> String {
        let images = if self.user_images.is_empty() {
            "None".to_string()
        } else {
            self.user_images
                .iter()
                .map(|u| format!("- {}", u))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let itinerary = if self.tour_itinerary.trim().is_empty() {
            "None"
        } else {
            self.tour_itinerary.trim()
        };
        format!(
            "BLOG GENERATION REQUEST\n\n\
             Tone: {}\nLanguage: {}\nCreativity Level: {}\n\
             Main Topic/Prompt: {}\n\
             Tour Itinerary: {}\n\
             User Images:\n{}\n\n\
             For EACH image URL above, call get_multimodal_capability with a short query such as \
             \"Describe the scene, key objects, activities, ambiance and travel context\" before writing.",
            self.tone,
            self.language,
            self.creativity,
            self.user_prompt.trim(),
            itinerary,
            images
        )
    }
}

/// 游记生成编排器
pub struct BlogGenerator {
    orchestrator: Arc<TaskOrchestrator>,
    profile: TaskProfile,
}

impl BlogGenerator {
    pub fn new(orchestrator: Arc<TaskOrchestrator>, max_rounds: usize) -> Result<Self, AgentError> {
        let profile =
            orchestrator.profile("blog_generator", ROLE_INSTRUCTIONS, &BLOG_TOOLS, max_rounds)?;
        Ok(Self {
            orchestrator,
            profile,
        })
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub async fn generate(&self, request: &BlogRequest) -> Result<TaskOutcome<BlogPost>, AgentError> {
        self.generate_with(request, RunControl::default()).await
    }

    pub async fn generate_with(
        &self,
        request: &BlogRequest,
        control: RunControl,
    ) -> Result<TaskOutcome<BlogPost>, AgentError> {
        request.validate()?;
        let session_id = new_session_id();
        tracing::info!(%session_id, images = request.user_images.len(), "generating blog");
        self.orchestrator
            .run(&self.profile, &request.request_text(), &session_id, control)
            .await
    }
}
