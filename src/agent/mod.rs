//! 领域编排：行程规划与游记生成，结构化结果与兜底

pub mod blog;
pub mod fallback;
pub mod model;
pub mod orchestrator;
pub mod trip;

pub use blog::{BlogGenerator, BlogRequest, BLOG_TOOLS};
pub use fallback::{new_session_id, now_timestamp, FallbackError, FallbackStore, FromFallback};
pub use model::{
    Accommodation, Activity, BlogContent, BlogMetadata, BlogPost, CityPlan, DayPlan, Geocode,
    typed_view, Itinerary, Overview, Price, ResultKind, StructuredResult, Travel, TripPlan,
};
pub use orchestrator::{
    decode_structured, spawn_run, ResultSource, RunControl, TaskOrchestrator, TaskOutcome,
    TaskProfile,
};
pub use trip::{TripPlanner, TRIP_TOOLS};
