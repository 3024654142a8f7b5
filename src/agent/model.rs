//! 结构化结果：行程计划（TripPlan）与游记（BlogPost）
//!
//! 字段名与前端约定的 JSON 保持一致（包括 `Requirement_options`、`Cities`、`Accomodation` 等拼写），
//! 嵌套结构缺字段或为 null 时取默认值；顶层的 `itinerary` / `blog_content` 必须存在。
//! 这些类型只是校验与读取用的视图，对外返回的仍是模型给出的原始 JSON 文档。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 结果种类；决定兜底文档的文件名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Trip,
    Blog,
}

impl ResultKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ResultKind::Trip => "trip_plan.json",
            ResultKind::Blog => "blog.json",
        }
    }
}

impl std::fmt::Display for ResultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultKind::Trip => f.write_str("trip"),
            ResultKind::Blog => f.write_str("blog"),
        }
    }
}

/// 编排器可产出的结构化结果
pub trait StructuredResult: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    const KIND: ResultKind;

    /// 写入会话 ID 与时间戳；其它字段不动
    fn stamp(&mut self, session_id: &str, timestamp: &str);

    fn session_id(&self) -> &str;

    /// 解码后的额外结构校验
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// 递归去掉对象中值为 null 的键与数组中的 null 元素，使其落到字段默认值
fn prune_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(prune_nulls);
        }
        Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(prune_nulls);
        }
        _ => {}
    }
}

/// 从 JSON 文档解出类型化视图并校验；文档本身不被修改
pub fn typed_view<T: StructuredResult>(doc: &Value) -> Result<T, String> {
    if !doc.is_object() {
        return Err("top level must be a JSON object".to_string());
    }
    let mut copy = doc.clone();
    prune_nulls(&mut copy);
    let typed: T = serde_json::from_value(copy).map_err(|e| e.to_string())?;
    typed.validate()?;
    Ok(typed)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geocode {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripPlan {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "Requirement_options", default)]
    pub requirement_options: Vec<String>,
    #[serde(default = "default_intent")]
    pub intent: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: String,
    pub itinerary: Itinerary,
}

fn default_intent() -> String {
    "trip_planning".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Itinerary {
    pub overview: Overview,
    #[serde(rename = "Cities")]
    pub cities: Vec<CityPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overview {
    pub start_location: String,
    pub destination_location: String,
    pub summary: String,
    pub duration_days: u32,
    pub people_count: u32,
    pub start_date: String,
    pub end_date: String,
    pub image_urls: Vec<String>,
    #[serde(rename = "Estimated_overall_cost")]
    pub estimated_overall_cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CityPlan {
    pub travel: Travel,
    #[serde(rename = "Accomodation")]
    pub accommodation: Accommodation,
    pub days: Vec<DayPlan>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Travel {
    pub from: String,
    pub to: String,
    pub estimate_time: f64,
    pub estimate_price: f64,
    pub option: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accommodation {
    pub name: String,
    pub description: String,
    pub address: String,
    pub geocode: Geocode,
    pub rating: f64,
    pub review_count: u32,
    pub phone: String,
    pub amenities: Vec<String>,
    pub price: Price,
    pub guests: u32,
    pub image_urls: Vec<String>,
    pub booking_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayPlan {
    pub title: String,
    pub date: String,
    pub description: String,
    pub day_number: String,
    pub activities: Vec<Activity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Activity {
    pub tag: String,
    pub title: String,
    pub description: String,
    pub minimum_duration: String,
    pub booking_url: String,
    pub address: String,
    #[serde(rename = "NumberOfReview")]
    pub number_of_review: u32,
    #[serde(rename = "Ratings")]
    pub ratings: f64,
    pub geocode: Geocode,
    pub image_urls: Vec<String>,
}

impl StructuredResult for TripPlan {
    const KIND: ResultKind = ResultKind::Trip;

    fn stamp(&mut self, session_id: &str, timestamp: &str) {
        self.session_id = session_id.to_string();
        self.timestamp = timestamp.to_string();
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    pub blog_content: BlogContent,
    #[serde(default)]
    pub metadata: BlogMetadata,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogContent {
    pub title: String,
    /// Markdown 正文
    #[serde(rename = "Detail")]
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogMetadata {
    pub word_count: u32,
    pub reading_time: String,
    pub generated_at: String,
}

impl StructuredResult for BlogPost {
    const KIND: ResultKind = ResultKind::Blog;

    fn stamp(&mut self, session_id: &str, timestamp: &str) {
        self.session_id = session_id.to_string();
        self.timestamp = timestamp.to_string();
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn validate(&self) -> Result<(), String> {
        if self.blog_content.title.trim().is_empty() {
            return Err("blog_content.title is empty".to_string());
        }
        if self.blog_content.detail.trim().is_empty() {
            return Err("blog_content.Detail is empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trip_plan_keeps_wire_names() {
        let plan: TripPlan = serde_json::from_value(json!({
            "message": "Here is your trip",
            "Requirement_options": ["3 days"],
            "itinerary": {
                "overview": {"destination_location": "Rome", "duration_days": 3, "Estimated_overall_cost": 900},
                "Cities": [{"Accomodation": {"name": "Hotel Roma"}, "days": [{"activities": [{"NumberOfReview": 5, "Ratings": 4.5}]}]}]
            }
        }))
        .unwrap();
        assert_eq!(plan.intent, "trip_planning");
        assert_eq!(plan.itinerary.cities[0].accommodation.name, "Hotel Roma");
        assert_eq!(plan.itinerary.cities[0].days[0].activities[0].ratings, 4.5);

        let back = serde_json::to_value(&plan).unwrap();
        assert_eq!(back["itinerary"]["Cities"][0]["Accomodation"]["name"], "Hotel Roma");
        assert_eq!(back["itinerary"]["overview"]["Estimated_overall_cost"], 900.0);
        assert!(back.get("sessionId").is_some());
    }

    #[test]
    fn test_trip_plan_requires_itinerary() {
        assert!(serde_json::from_value::<TripPlan>(json!({"message": "hi"})).is_err());
    }

    #[test]
    fn test_blog_validation() {
        let mut post: BlogPost = serde_json::from_value(json!({
            "blog_content": {"title": "Kyoto", "Detail": "# Kyoto\n\nTemples."}
        }))
        .unwrap();
        assert!(post.validate().is_ok());
        post.stamp("session_1", "2025-01-01T00:00:00Z");
        assert_eq!(post.session_id(), "session_1");

        post.blog_content.detail = " ".into();
        assert!(post.validate().is_err());
    }

    #[test]
    fn test_typed_view_treats_null_as_default() {
        let doc = json!({
            "message": null,
            "itinerary": {
                "overview": {"duration_days": null, "image_urls": ["https://a.example/1.jpg", null]},
                "Cities": [{"Accomodation": {"name": "Casa", "geocode": {"latitude": null, "longitude": null}}}]
            }
        });
        let plan: TripPlan = typed_view(&doc).unwrap();
        assert_eq!(plan.message, "");
        assert_eq!(plan.itinerary.overview.duration_days, 0);
        assert_eq!(plan.itinerary.overview.image_urls, vec!["https://a.example/1.jpg"]);
        assert_eq!(plan.itinerary.cities[0].accommodation.geocode, Geocode::default());
        // 原文档保持不变
        assert!(doc["itinerary"]["Cities"][0]["Accomodation"]["geocode"]["latitude"].is_null());
    }

    #[test]
    fn test_typed_view_still_requires_top_level_shape() {
        assert!(typed_view::<TripPlan>(&json!({"itinerary": null})).is_err());
        assert!(typed_view::<TripPlan>(&json!(["not", "an", "object"])).is_err());
        assert!(typed_view::<BlogPost>(&json!({"blog_content": {"title": null, "Detail": "x"}})).is_err());
    }
}
