//! Agent 构建器：统一的初始化逻辑
//!
//! CLI 与 HTTP 前端共用同一套补全后端、工具注册表与兜底库。

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{BlogGenerator, FallbackStore, TaskOrchestrator, TripPlanner};
use crate::config::{AppConfig, Secrets};
use crate::core::AgentError;
use crate::llm::{
    create_deepseek_client, create_groq_client, GeminiClient, LlmClient, MockLlmClient,
    OpenAiClient, GEMINI_DEFAULT_MODEL,
};
use crate::tools::{
    ActivitiesTool, ApifyClient, HotelsTool, ImageSearchTool, SerperClient, ToolRegistry,
    VisionTool, WeatherTool, WebSearchTool, WebsiteContentTool,
};

/// 按配置选择补全后端；所选后端缺少密钥时退回 Mock 并告警
pub fn create_llm_from_config(cfg: &AppConfig, secrets: &Secrets) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    let model = cfg.llm.model.as_deref();
    let timeout = cfg.llm.timeouts.request;

    let missing = |env: &str| {
        tracing::warn!(provider = %provider, "{} not set, using Mock LLM", env);
        Arc::new(MockLlmClient) as Arc<dyn LlmClient>
    };

    match provider.as_str() {
        "gemini" => match secrets.gemini_api_key.as_deref() {
            Some(key) => {
                let model = model.unwrap_or(GEMINI_DEFAULT_MODEL);
                tracing::info!("Using Gemini LLM ({})", model);
                Arc::new(GeminiClient::new(model, key, timeout))
            }
            None => missing("GEMINI_API_KEY"),
        },
        "openai" => match secrets.openai_api_key.as_deref() {
            Some(key) => {
                let model = model.unwrap_or("gpt-4o-mini");
                tracing::info!("Using OpenAI LLM ({})", model);
                Arc::new(
                    OpenAiClient::new(cfg.llm.base_url.as_deref(), model, key)
                        .with_request_timeout(timeout),
                )
            }
            None => missing("OPENAI_API_KEY"),
        },
        "deepseek" => match secrets.deepseek_api_key.as_deref() {
            Some(key) => {
                let client = create_deepseek_client(model, key).with_request_timeout(timeout);
                tracing::info!("Using DeepSeek LLM ({})", client.model());
                Arc::new(client)
            }
            None => missing("DEEPSEEK_API_KEY"),
        },
        "groq" => match secrets.groq_api_key.as_deref() {
            Some(key) => {
                let client = create_groq_client(model, key).with_request_timeout(timeout);
                tracing::info!("Using Groq LLM ({})", client.model());
                Arc::new(client)
            }
            None => missing("GROQ_API_KEY"),
        },
        "mock" => Arc::new(MockLlmClient),
        other => {
            tracing::warn!("Unknown LLM provider '{}', using Mock LLM", other);
            Arc::new(MockLlmClient)
        }
    }
}

/// 构建完整工具注册表；缺少密钥的工具照常注册，调用时返回错误观察
pub fn build_tool_registry(cfg: &AppConfig, secrets: &Secrets) -> Result<ToolRegistry, AgentError> {
    let tools = &cfg.tools;
    let serper = SerperClient::new(&tools.serper, secrets.serper_api_key.clone());
    let apify = ApifyClient::new(&tools.apify, secrets.apify_api_token.clone());

    for (env, value) in [
        ("SERPER_API_KEY", &secrets.serper_api_key),
        ("APIFY_API_TOKEN", &secrets.apify_api_token),
        ("GROQ_API_KEY", &secrets.groq_api_key),
    ] {
        if value.is_none() {
            tracing::warn!("{} not set; tools that need it will report errors", env);
        }
    }

    let mut registry = ToolRegistry::new();
    registry.register(WebSearchTool::new(serper.clone()))?;
    registry.register(WebsiteContentTool::new(serper.clone()))?;
    registry.register(ImageSearchTool::new(serper))?;
    registry.register(HotelsTool::new(apify.clone()))?;
    registry.register(ActivitiesTool::new(apify))?;
    registry.register(WeatherTool::new(&tools.weather))?;
    registry.register(VisionTool::new(&tools.vision, secrets.groq_api_key.clone()))?;
    Ok(registry)
}

/// Agent 构建器
pub struct AgentBuilder {
    config: AppConfig,
    secrets: Secrets,
    llm: Option<Arc<dyn LlmClient>>,
    registry: Option<ToolRegistry>,
    fallback: Option<FallbackStore>,
}

impl AgentBuilder {
    /// 从配置创建；密钥默认从环境变量读取
    pub fn from_config(config: AppConfig) -> Self {
        Self {
            config,
            secrets: Secrets::from_env(),
            llm: None,
            registry: None,
            fallback: None,
        }
    }

    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// 替换补全后端（测试或嵌入时使用）
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_tool_registry(mut self, registry: ToolRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_fallback_store(mut self, store: FallbackStore) -> Self {
        self.fallback = Some(store);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 构建全部组件；兜底库无法加载时失败
    pub fn build(self) -> Result<AgentComponents, AgentError> {
        let fallback = match self.fallback {
            Some(store) => store,
            None => FallbackStore::load(&self.config.fallback.dir)?,
        };
        let llm = match self.llm {
            Some(llm) => llm,
            None => create_llm_from_config(&self.config, &self.secrets),
        };
        let registry = match self.registry {
            Some(registry) => registry,
            None => build_tool_registry(&self.config, &self.secrets)?,
        };
        tracing::info!(
            llm = llm.name(),
            tools = ?registry.tool_names(),
            "agent components ready"
        );

        let orchestrator = Arc::new(
            TaskOrchestrator::new(llm, Arc::new(registry), Arc::new(fallback))
                .with_tool_timeout(self.config.tools.tool_timeout_secs)
                .with_stop_sequences(self.config.llm.stop_sequences.clone()),
        );
        let agent = &self.config.agent;
        let trip = TripPlanner::new(
            Arc::clone(&orchestrator),
            agent.trip_max_rounds(),
            agent.trip.min_image_urls,
        )?;
        let blog = BlogGenerator::new(Arc::clone(&orchestrator), agent.blog_max_rounds())?;

        Ok(AgentComponents {
            trip,
            blog,
            orchestrator,
            config: self.config,
        })
    }
}

/// 预构建的组件，可在多个请求间共享
pub struct AgentComponents {
    pub trip: TripPlanner,
    pub blog: BlogGenerator,
    pub orchestrator: Arc<TaskOrchestrator>,
    pub config: AppConfig,
}

/// 便捷函数：加载配置（失败时用默认值）并创建构建器
pub fn create_agent_builder(config_path: Option<PathBuf>) -> AgentBuilder {
    let config = crate::config::load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    AgentBuilder::from_config(config)
}
