//! 行程规划：搜索目的地 -> 酒店 -> 活动 -> 图片 -> 输出单个 TripPlan JSON

use std::sync::Arc;

use crate::agent::fallback::new_session_id;
use crate::agent::model::TripPlan;
use crate::agent::orchestrator::{RunControl, TaskOrchestrator, TaskOutcome, TaskProfile};
use crate::core::AgentError;

/// 行程规划可用的工具
pub const TRIP_TOOLS: [&str; 6] = [
    "get_search_results",
    "get_raw_website_content",
    "get_hotels",
    "get_activities",
    "get_image_search",
    "get_weather",
];

const TRIP_SCHEMA: &str = r#"{
  "message": "Your conversational response to the user",
  "Requirement_options": ["extracted user preferences/requirements"],
  "intent": "trip_planning",
  "sessionId": "the session ID given in the request",
  "timestamp": "current ISO timestamp",
  "itinerary": {
    "overview": {
      "start_location": "departure city",
      "destination_location": "main destination or 'Multiple Cities'",
      "summary": "brief trip summary",
      "duration_days": 0,
      "people_count": 0,
      "start_date": "YYYY-MM-DD",
      "end_date": "YYYY-MM-DD",
      "image_urls": ["destination image URLs from get_image_search"],
      "Estimated_overall_cost": 0
    },
    "Cities": [
      {
        "travel": {"from": "", "to": "", "estimate_time": 0, "estimate_price": 0, "option": "flight/train/bus/car"},
        "Accomodation": {
          "name": "", "description": "", "address": "",
          "geocode": {"latitude": 0.0, "longitude": 0.0},
          "rating": 0, "review_count": 0, "phone": "", "amenities": [],
          "price": {"amount": 0, "currency": "USD"},
          "guests": 0, "image_urls": [], "booking_url": ""
        },
        "days": [
          {
            "title": "", "date": "YYYY-MM-DD", "description": "", "day_number": "Day 1",
            "activities": [
              {
                "tag": "", "title": "", "description": "", "minimum_duration": "",
                "booking_url": "", "address": "", "NumberOfReview": 0, "Ratings": 0.0,
                "geocode": {"latitude": 0.0, "longitude": 0.0}, "image_urls": []
              }
            ]
          }
        ]
      }
    ]
  }
}"#;

fn role_instructions(min_image_urls: usize) -> String {
    format!(
        "You are an expert trip planning assistant that creates complete travel itineraries.\n\n\
         WORKFLOW\n\
         1. Use get_search_results to choose destinations that fit the user's requirements.\n\
         2. Use get_hotels to find accommodation in each destination.\n\
         3. Use get_activities to find attractions and restaurants in each destination.\n\
         4. Use get_image_search to collect images of the main destination.\n\
         5. Use get_weather when the travel dates are close or the user asks about weather.\n\
         6. Use get_raw_website_content to read a travel guide found by get_search_results when snippets are not enough.\n\n\
         HARD CONSTRAINTS\n\
         - The final <response> must contain ONE JSON object and nothing else, matching this structure exactly:\n\
         {schema}\n\
         - itinerary.overview.image_urls must contain at least {min} image URLs returned by get_image_search.\n\
         - Use only facts returned by the tools. Never use placeholder data, example.com links or invented values.\n\
         - Include 2-3 activities per day and valid numeric geocodes.\n\
         - Fill Requirement_options with the preferences extracted from the user's query.",
        schema = TRIP_SCHEMA,
        min = min_image_urls
    )
}

fn request_text(session_id: &str, query: &str) -> String {
    format!(
        "Session ID: {}\nToday's date: {}\nUser Query: {}\n\n\
         Please create a comprehensive trip plan following the exact JSON format specified in your instructions.",
        session_id,
        chrono::Utc::now().format("%Y-%m-%d"),
        query.trim()
    )
}

/// 行程规划编排器
pub struct TripPlanner {
    orchestrator: Arc<TaskOrchestrator>,
    profile: TaskProfile,
}

impl TripPlanner {
    pub fn new(
        orchestrator: Arc<TaskOrchestrator>,
        max_rounds: usize,
        min_image_urls: usize,
    ) -> Result<Self, AgentError> {
        let profile = orchestrator.profile(
            "trip_planner",
            &role_instructions(min_image_urls),
            &TRIP_TOOLS,
            max_rounds,
        )?;
        Ok(Self {
            orchestrator,
            profile,
        })
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub async fn plan(
        &self,
        query: &str,
        session_id: Option<&str>,
    ) -> Result<TaskOutcome<TripPlan>, AgentError> {
        self.plan_with(query, session_id, RunControl::default()).await
    }

    /// 规划行程；传入的 session_id 会写入结果，缺省时生成新的
    pub async fn plan_with(
        &self,
        query: &str,
        session_id: Option<&str>,
        control: RunControl,
    ) -> Result<TaskOutcome<TripPlan>, AgentError> {
        if query.trim().is_empty() {
            return Err(AgentError::InvalidRequest("No query provided".to_string()));
        }
        let session_id = session_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_session_id);
        tracing::info!(%session_id, "planning trip");
        self.orchestrator
            .run(&self.profile, &request_text(&session_id, query), &session_id, control)
            .await
    }
}
