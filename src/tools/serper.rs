//! Serper 工具：图片搜索（/images）、网页搜索（/search）与网页正文抓取（scrape 服务）

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::SerperSection;
use crate::tools::http::{http_client, post_json, require_key, to_pretty};
use crate::tools::{ParamType, SpecError, Tool, ToolArgs, ToolSpec};

/// Serper 调用端（搜索与抓取工具共用）
#[derive(Clone)]
pub struct SerperClient {
    http: Client,
    base_url: String,
    scrape_url: String,
    api_key: Option<String>,
}

impl SerperClient {
    pub fn new(section: &SerperSection, api_key: Option<String>) -> Self {
        Self {
            http: http_client(section.timeout_secs),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            scrape_url: section.scrape_url.clone(),
            api_key,
        }
    }

    async fn query(&self, endpoint: &str, query: &str) -> Result<Value, String> {
        let key = require_key(&self.api_key, "SERPER_API_KEY")?;
        let url = format!("{}/{}", self.base_url, endpoint);
        post_json(&self.http, &url, &[("X-API-KEY", key)], &json!({ "q": query })).await
    }

    async fn scrape(&self, website: &str) -> Result<Value, String> {
        let key = require_key(&self.api_key, "SERPER_API_KEY")?;
        post_json(
            &self.http,
            &self.scrape_url,
            &[("X-API-KEY", key)],
            &json!({ "url": website }),
        )
        .await
    }
}

fn max_results(args: &ToolArgs) -> usize {
    args.u64("max_results").unwrap_or(5).clamp(1, 20) as usize
}

fn image_results(query: &str, data: &Value, max: usize) -> Result<Value, String> {
    let images = data
        .get("images")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "no image results returned".to_string())?;
    let urls: Vec<&str> = images
        .iter()
        .filter_map(|img| img.get("imageUrl").and_then(|u| u.as_str()))
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .take(max)
        .collect();
    Ok(json!({
        "search_query": query,
        "total_results": urls.len(),
        "results": urls,
    }))
}

fn web_results(query: &str, data: &Value, max: usize) -> Result<Value, String> {
    let organic = data
        .get("organic")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "no search results returned".to_string())?;
    let field = |item: &Value, key: &str, missing: &str| -> String {
        item.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(missing)
            .to_string()
    };
    let results: Vec<Value> = organic
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, item)| {
            json!({
                "position": i + 1,
                "title": field(item, "title", "No title available"),
                "link": field(item, "link", "No link available"),
                "snippet": field(item, "snippet", "No snippet available"),
                "source": field(item, "displayLink", "Unknown source"),
            })
        })
        .collect();
    Ok(json!({
        "search_query": query,
        "total_results": results.len(),
        "results": results,
    }))
}

/// get_image_search：返回图片 URL 列表
pub struct ImageSearchTool {
    serper: SerperClient,
}

impl ImageSearchTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait]
impl Tool for ImageSearchTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_image_search")
            .description("Search the web for images. Returns a list of image URLs for the query.")
            .required(
                "query",
                ParamType::String,
                "What to search for, e.g. \"Eiffel Tower at night\"",
            )
            .optional_with_default(
                "max_results",
                ParamType::Integer,
                json!(5),
                "Maximum number of image URLs to return",
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let query = args.require_str("query")?;
        let data = self.serper.query("images", query).await?;
        image_results(query, &data, max_results(&args)).map(|v| to_pretty(&v))
    }
}

/// get_search_results：返回网页搜索结果（标题、链接、摘要）
pub struct WebSearchTool {
    serper: SerperClient,
}

impl WebSearchTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_search_results")
            .description(
                "Search the internet for information on a topic. Returns titles, links and snippets.",
            )
            .required(
                "query",
                ParamType::String,
                "Search query, e.g. \"best restaurants in Paris\"",
            )
            .optional_with_default(
                "max_results",
                ParamType::Integer,
                json!(5),
                "Maximum number of results to return",
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let query = args.require_str("query")?;
        let data = self.serper.query("search", query).await?;
        web_results(query, &data, max_results(&args)).map(|v| to_pretty(&v))
    }
}

fn check_website(website: &str) -> Result<(), String> {
    let website = website.trim();
    let rest = website
        .strip_prefix("https://")
        .or_else(|| website.strip_prefix("http://"))
        .ok_or_else(|| format!("website must be an http(s) URL, got: {}", website))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(format!("website has no host: {}", website));
    }
    Ok(())
}

fn page_content(website: &str, data: &Value) -> Value {
    let text = |key: &str| data.get(key).and_then(|v| v.as_str());
    json!({
        "website": website,
        "status": "success",
        "title": text("title").unwrap_or("No title found"),
        "description": text("description").unwrap_or("No description found"),
        "content": text("text").or_else(|| text("content")).unwrap_or("No content found"),
        "url": text("url").unwrap_or(website),
    })
}

/// get_raw_website_content：抓取网页正文，原样返回（不做摘要）
pub struct WebsiteContentTool {
    serper: SerperClient,
}

impl WebsiteContentTool {
    pub fn new(serper: SerperClient) -> Self {
        Self { serper }
    }
}

#[async_trait]
impl Tool for WebsiteContentTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_raw_website_content")
            .description(
                "Fetch the full text of a web page without summarization. \
                 Use it when search snippets are not detailed enough.",
            )
            .required(
                "website",
                ParamType::String,
                "The page URL to read, e.g. \"https://www.lonelyplanet.com/portugal/lisbon\"",
            )
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let website = args.require_str("website")?.trim();
        check_website(website)?;
        let data = self.serper.scrape(website).await?;
        Ok(to_pretty(&page_content(website, &data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_results_keeps_http_urls_only() {
        let data = json!({"images": [
            {"imageUrl": "https://a.example/1.jpg"},
            {"imageUrl": "data:image/png;base64,xyz"},
            {"title": "no url"},
            {"imageUrl": "http://b.example/2.jpg"},
            {"imageUrl": "https://c.example/3.jpg"}
        ]});
        let out = image_results("paris", &data, 2).unwrap();
        assert_eq!(out["total_results"], 2);
        assert_eq!(
            out["results"],
            json!(["https://a.example/1.jpg", "http://b.example/2.jpg"])
        );
    }

    #[test]
    fn test_image_results_missing_key() {
        assert!(image_results("q", &json!({"organic": []}), 5).is_err());
    }

    #[test]
    fn test_web_results_fill_missing_fields() {
        let data = json!({"organic": [
            {"title": "Guide", "link": "https://g.example", "snippet": "s", "displayLink": "g.example"},
            {"title": "Only title"}
        ]});
        let out = web_results("q", &data, 5).unwrap();
        assert_eq!(out["total_results"], 2);
        assert_eq!(out["results"][0]["source"], "g.example");
        assert_eq!(out["results"][1]["position"], 2);
        assert_eq!(out["results"][1]["link"], "No link available");
    }

    #[test]
    fn test_page_content_prefers_text_then_content() {
        let out = page_content(
            "https://guide.example/lisbon",
            &json!({"title": "Lisbon in 3 days", "content": "Day 1: Alfama"}),
        );
        assert_eq!(out["title"], "Lisbon in 3 days");
        assert_eq!(out["content"], "Day 1: Alfama");
        assert_eq!(out["description"], "No description found");
        assert_eq!(out["url"], "https://guide.example/lisbon");

        let out = page_content("https://a.example", &json!({"text": "t", "content": "c"}));
        assert_eq!(out["content"], "t");
    }

    #[tokio::test]
    async fn test_website_must_be_http_url() {
        let tool = WebsiteContentTool::new(SerperClient::new(
            &SerperSection::default(),
            Some("key".into()),
        ));
        for bad in ["ftp://files.example/x", "lisbon travel guide", "https://"] {
            let args = tool.spec().unwrap().validate(&json!({"website": bad})).unwrap();
            assert!(tool.execute(args).await.is_err(), "{} accepted", bad);
        }
        let tool = WebsiteContentTool::new(SerperClient::new(&SerperSection::default(), None));
        let args = tool
            .spec()
            .unwrap()
            .validate(&json!({"website": "https://guide.example"}))
            .unwrap();
        assert_eq!(
            tool.execute(args).await.unwrap_err(),
            "SERPER_API_KEY is not configured"
        );
    }

    #[tokio::test]
    async fn test_missing_key_is_execution_error() {
        let tool = ImageSearchTool::new(SerperClient::new(&SerperSection::default(), None));
        let args = tool.spec().unwrap().validate(&json!({"query": "x"})).unwrap();
        assert_eq!(
            tool.execute(args).await.unwrap_err(),
            "SERPER_API_KEY is not configured"
        );
    }
}
