//! 酒店 / 活动工具：调用 Apify 上的 Tripadvisor actor
//!
//! 使用 `run-sync-get-dataset-items` 同步运行 actor 并直接取回数据集条目，
//! 再把条目整理成模型易读的 JSON（酒店：名称/地址/坐标/评分/价格/图片；活动：类别/标题/地址/坐标/评分/图片）。

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ApifySection;
use crate::tools::http::{http_client, post_json, require_key, to_pretty};
use crate::tools::{ParamType, SpecError, Tool, ToolArgs, ToolSpec};

const MAX_IMAGES_PER_ITEM: usize = 5;

/// Apify actor 调用端（酒店与活动工具共用）
#[derive(Clone)]
pub struct ApifyClient {
    http: Client,
    base_url: String,
    actor_id: String,
    currency: String,
    token: Option<String>,
}

impl ApifyClient {
    pub fn new(section: &ApifySection, token: Option<String>) -> Self {
        Self {
            http: http_client(section.timeout_secs),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            actor_id: section.actor_id.clone(),
            currency: section.currency.clone(),
            token,
        }
    }

    async fn run(&self, input: Value) -> Result<Vec<Value>, String> {
        let token = require_key(&self.token, "APIFY_API_TOKEN")?;
        let url = format!(
            "{}/acts/{}/run-sync-get-dataset-items",
            self.base_url, self.actor_id
        );
        let auth = format!("Bearer {}", token);
        let data = post_json(&self.http, &url, &[("Authorization", auth.as_str())], &input).await?;
        match data {
            Value::Array(items) => Ok(items),
            other => Err(format!(
                "unexpected actor output: expected a list of items, got {}",
                crate::text::truncate_chars(&other.to_string(), 120)
            )),
        }
    }

    fn base_input(&self, location: &str, max_items: u64) -> Value {
        json!({
            "query": location,
            "maxItemsPerQuery": max_items,
            "includeTags": true,
            "includeNearbyResults": true,
            "includeVacationRentals": false,
            "includeAiReviewsSummary": false,
            "language": "en",
            "currency": self.currency,
        })
    }
}

fn merge(mut base: Value, extra: Value) -> Value {
    if let (Some(b), Value::Object(e)) = (base.as_object_mut(), extra) {
        b.extend(e);
    }
    base
}

fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

/// 坐标字段可能是数字或字符串
fn coord(item: &Value, key: &str) -> f64 {
    match item.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn photos(item: &Value) -> Value {
    let urls: Vec<Value> = item
        .get("photos")
        .and_then(|p| p.as_array())
        .map(|arr| arr.iter().take(MAX_IMAGES_PER_ITEM).cloned().collect())
        .unwrap_or_default();
    Value::Array(urls)
}

fn fallback_description(item: &Value, noun: &str) -> String {
    format!(
        "{} in {}",
        str_field(item, "name").unwrap_or(noun),
        str_field(item, "locationString").unwrap_or("Unknown")
    )
}

fn hotel_from_item(item: &Value) -> Value {
    json!({
        "name": str_field(item, "name")
            .or_else(|| str_field(item, "locationString"))
            .unwrap_or("Unknown Hotel"),
        "description": str_field(item, "description")
            .map(str::to_string)
            .unwrap_or_else(|| fallback_description(item, "Hotel")),
        "booking_url": str_field(item, "webUrl").or_else(|| str_field(item, "website")),
        "address": str_field(item, "address").unwrap_or("Address not available"),
        "geocode": {"latitude": coord(item, "latitude"), "longitude": coord(item, "longitude")},
        "phone": item.get("phone").cloned().unwrap_or(Value::Null),
        "number_of_reviews": item.get("numberOfReviews").cloned().unwrap_or(json!(0)),
        "rating": item.get("rating").cloned().unwrap_or(json!(0.0)),
        "price_range": item.get("priceRange").cloned().unwrap_or(Value::Null),
        "amenities": item.get("amenities").cloned().unwrap_or(Value::Null),
        "image_urls": photos(item),
    })
}

fn activity_from_item(item: &Value) -> Value {
    json!({
        "tag": item.get("category").cloned().unwrap_or(Value::Null),
        "title": str_field(item, "name")
            .or_else(|| str_field(item, "locationString"))
            .unwrap_or("Unknown"),
        "description": str_field(item, "description")
            .map(str::to_string)
            .unwrap_or_else(|| fallback_description(item, "Place")),
        "minimum_duration": "1-2 hours",
        "booking_url": str_field(item, "webUrl").or_else(|| str_field(item, "website")),
        "address": str_field(item, "address").unwrap_or("Address not available"),
        "geocode": {"latitude": coord(item, "latitude"), "longitude": coord(item, "longitude")},
        "NumberOfReviews": item.get("numberOfReviews").cloned().unwrap_or(json!(0)),
        "Rating": item.get("rating").cloned().unwrap_or(json!(0.0)),
        "image_urls": photos(item),
    })
}

fn parse_date(args: &ToolArgs, name: &str) -> Result<NaiveDate, String> {
    let raw = args.require_str(name)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("{} must be a date in YYYY-MM-DD format, got '{}'", name, raw))
}

/// get_hotels：按城市与入住/离店日期查询酒店
pub struct HotelsTool {
    apify: ApifyClient,
}

impl HotelsTool {
    pub fn new(apify: ApifyClient) -> Self {
        Self { apify }
    }
}

#[async_trait]
impl Tool for HotelsTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_hotels")
            .description(
                "Search for hotels in a location. Returns name, description, address, geocode, \
                 number of reviews, rating, price range, amenities, contact info and image URLs.",
            )
            .required(
                "location",
                ParamType::String,
                "City or location, e.g. \"Lauterbrunnen,Switzerland\"",
            )
            .required("checkinDate", ParamType::String, "Check-in date, YYYY-MM-DD")
            .required("checkoutDate", ParamType::String, "Check-out date, YYYY-MM-DD")
            .optional_with_default(
                "max_items",
                ParamType::Integer,
                json!(1),
                "Maximum number of hotels to return",
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let location = args.require_str("location")?;
        let checkin = parse_date(&args, "checkinDate")?;
        let checkout = parse_date(&args, "checkoutDate")?;
        if checkout <= checkin {
            return Err("checkoutDate must be after checkinDate".to_string());
        }
        let max_items = args.u64("max_items").unwrap_or(1).max(1);

        let input = merge(
            self.apify.base_input(location, max_items),
            json!({
                "checkInDate": checkin.format("%Y-%m-%d").to_string(),
                "checkOutDate": checkout.format("%Y-%m-%d").to_string(),
                "includeHotels": true,
                "includePriceOffers": true,
                "includeAttractions": false,
                "includeRestaurants": false,
            }),
        );
        let items = self.apify.run(input).await?;
        tracing::debug!(location, count = items.len(), "hotel search finished");

        let hotels: Vec<Value> = items.iter().map(hotel_from_item).collect();
        Ok(to_pretty(&json!({ "hotels": hotels })))
    }
}

/// get_activities：查询景点与餐厅
pub struct ActivitiesTool {
    apify: ApifyClient,
}

impl ActivitiesTool {
    pub fn new(apify: ApifyClient) -> Self {
        Self { apify }
    }
}

#[async_trait]
impl Tool for ActivitiesTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_activities")
            .description(
                "Search for activities, attractions and restaurants in a location. Returns \
                 category, title, description, address, geocode, reviews, rating and image URLs.",
            )
            .required(
                "location",
                ParamType::String,
                "City or location, e.g. \"London,UK\"",
            )
            .optional_with_default(
                "max_items",
                ParamType::Integer,
                json!(2),
                "Maximum number of items to return",
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let location = args.require_str("location")?;
        let max_items = args.u64("max_items").unwrap_or(2).max(1);

        let input = merge(
            self.apify.base_input(location, max_items),
            json!({
                "includeAttractions": true,
                "includeRestaurants": true,
                "includeHotels": false,
                "includePriceOffers": false,
            }),
        );
        let items = self.apify.run(input).await?;
        tracing::debug!(location, count = items.len(), "activity search finished");

        let activities: Vec<Value> = items.iter().map(activity_from_item).collect();
        Ok(to_pretty(&json!({ "activities": activities })))
    }
}
