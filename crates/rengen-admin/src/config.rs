//! 配置管理
//!
//! 支持TOML配置文件与 `RENGEN_` 前缀环境变量，提供验证和保存功能

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use rengen_client::{AuthenticationConfig, ClientConfig, RetryPolicy, TransportConfig};
use rengen_workflow::{LoadThresholds, Paginator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// 看板完整配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct DashboardConfig {
    /// 后端接口
    pub api: ApiConfig,
    /// 重试策略
    pub retry: RetryConfig,
    /// 队列分页
    pub queue: QueueConfig,
    /// 负载阈值
    pub load: LoadConfig,
    /// 日志
    pub logging: LoggingConfig,
}

/// 后端接口配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// 基础地址
    pub base_url: String,
    /// 请求超时（毫秒）
    pub timeout_ms: u64,
    /// 认证方式
    pub authentication: AuthenticationConfig,
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// 总尝试次数
    pub max_attempts: u32,
    /// 首次重试等待（毫秒）
    pub initial_delay_ms: u64,
    /// 退避倍数
    pub multiplier: u32,
}

/// 队列分页配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// 每页条数
    pub page_size: usize,
    /// 页码窗口大小
    pub page_window: usize,
}

/// 负载阈值配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    /// 医生超负荷比例
    pub overload_ratio: f64,
    /// 排班格子警告百分比
    pub warning_percent: f64,
    /// 排班格子超负荷百分比
    pub overload_percent: f64,
    /// 医生未设置时的每日最大UP
    pub default_max_up_per_day: i32,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
    Pretty,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或过滤表达式
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    pub show_target: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            base_url: transport.base_url,
            timeout_ms: transport.timeout.as_millis() as u64,
            authentication: AuthenticationConfig::None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            multiplier: policy.multiplier,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        let paginator = Paginator::default();
        Self {
            page_size: paginator.page_size,
            page_window: paginator.window,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        let thresholds = LoadThresholds::default();
        Self {
            overload_ratio: rengen_workflow::load::DEFAULT_OVERLOAD_RATIO,
            warning_percent: thresholds.warning_percent,
            overload_percent: thresholds.overload_percent,
            default_max_up_per_day: thresholds.default_max_up,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            ansi: true,
            show_target: false,
        }
    }
}

impl DashboardConfig {
    /// 加载配置：默认值 < 配置文件 < 环境变量
    ///
    /// 指定的文件必须存在；未指定时只读取环境变量。
    /// 环境变量示例：`RENGEN_API__BASE_URL`、`RENGEN_QUEUE__PAGE_SIZE`。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("RENGEN")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: DashboardConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match path {
            Some(path) => info!("Configuration loaded from: {}", path.display()),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    /// 客户端配置
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            transport: TransportConfig {
                base_url: self.api.base_url.clone(),
                timeout: Duration::from_millis(self.api.timeout_ms),
                authentication: self.api.authentication.clone(),
            },
            retry: RetryPolicy::new(
                self.retry.max_attempts,
                Duration::from_millis(self.retry.initial_delay_ms),
                self.retry.multiplier,
            ),
        }
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.queue.page_size, self.queue.page_window)
    }

    pub fn thresholds(&self) -> LoadThresholds {
        LoadThresholds {
            warning_percent: self.load.warning_percent,
            overload_percent: self.load.overload_percent,
            default_max_up: self.load.default_max_up_per_day,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: Arc<RwLock<DashboardConfig>>,
    /// 配置文件路径，未指定时不保存
    config_path: Option<PathBuf>,
    validator: ConfigValidator,
}

impl ConfigManager {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = DashboardConfig::load(config_path)?;
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path: config_path.map(Path::to_path_buf),
            validator,
        })
    }

    pub async fn get_config(&self) -> DashboardConfig {
        self.config.read().await.clone()
    }

    /// 验证后更新配置并写回文件
    pub async fn update_config(&self, new_config: DashboardConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        self.save_config().await?;
        info!("Configuration updated successfully");
        Ok(())
    }

    /// 保存到配置文件
    pub async fn save_config(&self) -> Result<()> {
        let path = match &self.config_path {
            Some(path) => path,
            None => return Ok(()),
        };

        let config = self.config.read().await;
        let config_str =
            toml::to_string_pretty(&*config).context("Failed to serialize configuration")?;

        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    pub async fn reload_config(&self) -> Result<()> {
        let new_config = DashboardConfig::load(self.config_path.as_deref())?;
        self.validator.validate(&new_config)?;
        *self.config.write().await = new_config;
        info!("Configuration reloaded");
        Ok(())
    }

    /// 按 `section.field` 路径读取配置值
    pub async fn get_value<T>(&self, path: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let config = self.config.read().await;
        let value = extract_nested_value(&config, path)
            .with_context(|| format!("Configuration path not found: {}", path))?;

        serde_json::from_value(value).context("Failed to deserialize configuration value")
    }

    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

fn extract_nested_value(config: &DashboardConfig, path: &str) -> Result<serde_json::Value> {
    let config_json = serde_json::to_value(config).context("Failed to serialize config to JSON")?;

    let mut current = &config_json;
    for part in path.split('.') {
        match current {
            serde_json::Value::Object(map) => {
                current = map
                    .get(part)
                    .ok_or_else(|| anyhow::anyhow!("Path segment not found: {}", part))?;
            }
            _ => return Err(anyhow::anyhow!("Invalid path at segment: {}", part)),
        }
    }

    Ok(current.clone())
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    validation_rules: Vec<ValidationRule>,
}

#[derive(Debug)]
struct ValidationRule {
    field_path: &'static str,
    validator: fn(&DashboardConfig) -> Result<()>,
}

impl ConfigValidator {
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "api.base_url",
                validator: |config| {
                    let url = config.api.base_url.trim();
                    if url.starts_with("http://") || url.starts_with("https://") {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Base URL must start with http:// or https://"))
                    }
                },
            },
            ValidationRule {
                field_path: "api.timeout_ms",
                validator: |config| {
                    if config.api.timeout_ms == 0 {
                        Err(anyhow::anyhow!("Request timeout cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "retry.max_attempts",
                validator: |config| {
                    if config.retry.max_attempts == 0 {
                        Err(anyhow::anyhow!("At least one attempt is required"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "queue",
                validator: |config| {
                    if config.queue.page_size == 0 || config.queue.page_window == 0 {
                        Err(anyhow::anyhow!("Page size and page window must be positive"))
                    } else {
                        Ok(())
                    }
                },
            },
            ValidationRule {
                field_path: "load",
                validator: |config| {
                    let load = &config.load;
                    if load.overload_ratio <= 0.0 {
                        Err(anyhow::anyhow!("Overload ratio must be positive"))
                    } else if load.warning_percent <= 0.0 || load.warning_percent > load.overload_percent {
                        Err(anyhow::anyhow!(
                            "Warning threshold must be positive and not above the overload threshold"
                        ))
                    } else {
                        Ok(())
                    }
                },
            },
        ];

        Self { validation_rules }
    }

    pub fn validate(&self, config: &DashboardConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("Invalid {}: {}", rule.field_path, e));
            }
        }
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
