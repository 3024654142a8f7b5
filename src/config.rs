//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖（双下划线表示嵌套，如 `WAYFARER__LLM__PROVIDER=groq`）。
//! API Key 不放在配置文件里，由 [`Secrets::from_env`] 在启动时一次性读取。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::default_stop_sequences;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub agent: AgentSection,
    pub tools: ToolsSection,
    pub fallback: FallbackSection,
    pub server: ServerSection,
}

/// [app] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
}

/// [llm] 段：后端选择、模型、stop 序列与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：gemini / openai / deepseek / groq / mock
    pub provider: String,
    /// 为空时使用各后端的默认模型
    pub model: Option<String>,
    /// 仅 openai 后端使用：自定义 OpenAI 兼容端点
    pub base_url: Option<String>,
    pub stop_sequences: Vec<String>,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            base_url: None,
            stop_sequences: default_stop_sequences(),
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    90
}

/// [agent] 段：默认轮数预算与各编排器的覆盖
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_rounds: usize,
    pub trip: TripSection,
    pub blog: BlogSection,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: 25,
            trip: TripSection::default(),
            blog: BlogSection::default(),
        }
    }
}

/// [agent.trip] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TripSection {
    pub max_rounds: Option<usize>,
    /// 行程概览至少需要的图片数（由 prompt 约束，不由循环校验）
    pub min_image_urls: usize,
}

impl Default for TripSection {
    fn default() -> Self {
        Self {
            max_rounds: Some(20),
            min_image_urls: 3,
        }
    }
}

/// [agent.blog] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlogSection {
    pub max_rounds: Option<usize>,
}

impl Default for BlogSection {
    fn default() -> Self {
        Self {
            max_rounds: Some(15),
        }
    }
}

/// [tools] 段：单次调用超时与各上游服务
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    pub tool_timeout_secs: u64,
    pub serper: SerperSection,
    pub apify: ApifySection,
    pub weather: WeatherSection,
    pub vision: VisionSection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 120,
            serper: SerperSection::default(),
            apify: ApifySection::default(),
            weather: WeatherSection::default(),
            vision: VisionSection::default(),
        }
    }
}

/// [tools.serper] 段：图片 / 网页搜索与网页正文抓取
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerperSection {
    pub base_url: String,
    /// 抓取服务地址（与搜索服务不同域）
    pub scrape_url: String,
    pub timeout_secs: u64,
}

impl Default for SerperSection {
    fn default() -> Self {
        Self {
            base_url: "https://google.serper.dev".to_string(),
            scrape_url: "https://scrape.serper.dev".to_string(),
            timeout_secs: 20,
        }
    }
}

/// [tools.apify] 段：酒店 / 活动数据（Tripadvisor actor）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApifySection {
    pub base_url: String,
    pub actor_id: String,
    pub timeout_secs: u64,
    pub currency: String,
}

impl Default for ApifySection {
    fn default() -> Self {
        Self {
            base_url: "https://api.apify.com/v2".to_string(),
            actor_id: "dbEyMBriog95Fv8CW".to_string(),
            timeout_secs: 110,
            currency: "USD".to_string(),
        }
    }
}

/// [tools.weather] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            endpoint: "https://weather-agent-xhzk.onrender.com/weather".to_string(),
            timeout_secs: 60,
        }
    }
}

/// [tools.vision] 段：图片理解（OpenAI 兼容的多模态接口）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionSection {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_attempts: u32,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "meta-llama/llama-4-scout-17b-16e-instruct".to_string(),
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

/// [fallback] 段：兜底结果文档目录
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackSection {
    pub dir: PathBuf,
}

impl Default for FallbackSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("config/fallback"),
        }
    }
}

/// [server] 段：HTTP 前端
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// 同时处理的请求上限（每个请求是一次独立的 ReAct 运行）
    pub max_concurrent_requests: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_concurrent_requests: 16,
        }
    }
}

impl AgentSection {
    pub fn trip_max_rounds(&self) -> usize {
        self.trip.max_rounds.unwrap_or(self.max_rounds).max(1)
    }

    pub fn blog_max_rounds(&self) -> usize {
        self.blog.max_rounds.unwrap_or(self.max_rounds).max(1)
    }
}

/// 进程级密钥：启动时读取一次，之后只读
#[derive(Clone, Default)]
pub struct Secrets {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    pub apify_api_token: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "set" } else { "unset" };
        f.debug_struct("Secrets")
            .field("gemini_api_key", &mask(&self.gemini_api_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("deepseek_api_key", &mask(&self.deepseek_api_key))
            .field("groq_api_key", &mask(&self.groq_api_key))
            .field("serper_api_key", &mask(&self.serper_api_key))
            .field("apify_api_token", &mask(&self.apify_api_token))
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            gemini_api_key: var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY")),
            openai_api_key: var("OPENAI_API_KEY"),
            deepseek_api_key: var("DEEPSEEK_API_KEY"),
            groq_api_key: var("GROQ_API_KEY"),
            serper_api_key: var("SERPER_API_KEY"),
            apify_api_token: var("APIFY_API_TOKEN"),
        }
    }
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
