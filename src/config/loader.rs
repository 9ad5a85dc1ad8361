//! 配置加载器实现
//!
//! 读取 TOML 配置，替换 `${VAR}` 引用后解析并验证

use crate::config::env::EnvSource;
use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "service-probe.toml";

/// `${VAR}` 形式的变量引用
static VAR_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable reference pattern")
});

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器
///
/// 启用变量替换时，`${VAR}` 按与目标解析相同的查找源取值：进程环境变量优先，
/// 其次是配置中 `global.env_file` 指向的 dotenv 文件。
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    enable_env_substitution: bool,
    env: Option<EnvSource>,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用 `${VAR}` 变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
            env: None,
        }
    }

    /// 使用固定的查找源替换变量，忽略配置中的 `env_file`
    pub fn with_env_source(mut self, env: EnvSource) -> Self {
        self.env = Some(env);
        self
    }

    /// 替换、解析并验证配置文本
    fn load_str(&self, content: &str) -> Result<Config> {
        let content = if self.enable_env_substitution {
            let env = match &self.env {
                Some(env) => env.clone(),
                None => declared_env_source(content)?,
            };
            Cow::Owned(substitute_env_vars(content, |key| env.get(key))?)
        } else {
            Cow::Borrowed(content)
        };

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;
        self.validate(&config)?;
        Ok(config)
    }
}

/// 读取未替换文本中的 `global.env_file`，构造变量查找源
///
/// 文本无法预解析时只使用进程环境变量，语法错误留给正式解析报告。
fn declared_env_source(content: &str) -> Result<EnvSource> {
    let env_file = toml::from_str::<toml::Table>(content)
        .ok()
        .and_then(|table| {
            table
                .get("global")?
                .get("env_file")?
                .as_str()
                .map(str::to_string)
        });

    match env_file {
        Some(path) => EnvSource::with_dotenv(path),
        None => Ok(EnvSource::process()),
    }
}

/// 按行替换 `${VAR}` 引用
///
/// 以 `#` 开头的注释行原样保留；引用的变量不存在时返回错误。
fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut output = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut missing = None;
        let replaced = VAR_REFERENCE.replace_all(line, |captures: &Captures| {
            lookup(&captures[1]).unwrap_or_else(|| {
                missing.get_or_insert_with(|| captures[1].to_string());
                String::new()
            })
        });
        if let Some(var) = missing {
            return Err(ConfigError::EnvVarError { var }.into());
        }
        output.push_str(&replaced);
    }

    Ok(output)
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        let content = tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => ConfigError::ParseError(format!("读取 {} 失败: {}", path.display(), e)),
        })?;

        let config = self.load_str(&content)?;
        info!(
            "已加载配置文件 {}，{} 个目标",
            path.display(),
            config.targets.len()
        );
        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.load_str(content)?;
        debug!("已解析配置文本，{} 个目标", config.targets.len());
        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `service-probe.toml`，否则使用用户配置目录。
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("service-probe").join("config.toml"))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TEST_CONFIG_TOML: &str = r#"
[global]
log_level = "debug"
connect_timeout_ms = 1000
read_timeout_ms = 1500

[global.web]
port = 9090

[[targets]]
name = "cache"
kind = "redis"
host = "redis"
port = 6380

[[targets]]
name = "db"
kind = "mysql"
host = "mysql"
enabled = false
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.global.connect_timeout_ms, 1000);
        assert_eq!(config.global.web.as_ref().map(|w| w.port), Some(9090));
        assert_eq!(
            config.global.web.as_ref().map(|w| w.bind_address.as_str()),
            Some("0.0.0.0")
        );
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].kind, ProbeKind::Redis);
        assert_eq!(config.targets[0].port, Some(6380));
        assert!(!config.targets[1].enabled);
    }

    #[tokio::test]
    async fn test_substitution_reads_env_file() {
        let mut dotenv = NamedTempFile::new().unwrap();
        writeln!(dotenv, "SERVICE_PROBE_TEST_CACHE_HOST=\"cache.example.internal\"").unwrap();

        let content = format!(
            r#"
[global]
env_file = "{}"

[[targets]]
name = "cache"
kind = "redis"
host = "${{SERVICE_PROBE_TEST_CACHE_HOST}}"
"#,
            dotenv.path().display()
        );
        let config = TomlConfigLoader::new(true)
            .load_from_string(&content)
            .await
            .unwrap();
        assert_eq!(config.targets[0].host, "cache.example.internal");
    }

    #[tokio::test]
    async fn test_substitution_with_explicit_source() {
        let env: EnvSource = [(
            "SERVICE_PROBE_TEST_DB_HOST".to_string(),
            "db.example.internal".to_string(),
        )]
        .into_iter()
        .collect();

        let content = r#"
[[targets]]
name = "db"
kind = "mysql"
host = "${SERVICE_PROBE_TEST_DB_HOST}"
"#;
        let config = TomlConfigLoader::new(true)
            .with_env_source(env)
            .load_from_string(content)
            .await
            .unwrap();
        assert_eq!(config.targets[0].host, "db.example.internal");
    }

    #[tokio::test]
    async fn test_commented_reference_is_ignored() {
        let content = r#"
[global]
# env_file = "${SERVICE_PROBE_TEST_UNSET_DIR}/.env"

# [[targets]]
#   host = "${SERVICE_PROBE_TEST_UNSET_HOST}"
"#;
        let config = TomlConfigLoader::new(true)
            .load_from_string(content)
            .await
            .unwrap();
        assert!(config.targets.is_empty());
        assert!(config.global.env_file.is_none());
    }

    #[tokio::test]
    async fn test_env_var_substitution_missing_var() {
        let content = r#"
[[targets]]
name = "cache"
kind = "redis"
host = "${SERVICE_PROBE_TEST_MISSING_VAR}"
"#;
        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(content).await;

        assert!(result.is_err());
        if let Err(e) = result {
            assert!(e.to_string().contains("SERVICE_PROBE_TEST_MISSING_VAR"));
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let content = r#"
[global]
read_timeout_ms = 0
"#;
        let loader = TomlConfigLoader::new(false);
        let err = loader.load_from_string(content).await.unwrap_err();
        assert!(err.to_string().contains("配置验证失败"));

        let err = loader.load_from_string("[[targets]]\nname = 1").await.unwrap_err();
        assert!(err.to_string().contains("TOML解析失败"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(TEST_CONFIG_TOML.as_bytes()).unwrap();

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(file.path()).await.unwrap();
        assert_eq!(config.targets[0].name, "cache");

        let err = loader
            .load_from_file("/nonexistent/service-probe.toml")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }

    #[test]
    fn test_substitute_env_vars() {
        let lookup = |key: &str| (key == "PORT").then(|| "6380".to_string());

        let output = substitute_env_vars("port = ${PORT}\n# ${MISSING}\n", lookup).unwrap();
        assert_eq!(output, "port = 6380\n# ${MISSING}\n");

        let err = substitute_env_vars("host = \"${MISSING}\"\n", lookup).unwrap_err();
        assert!(err.to_string().contains("MISSING"));
    }

    #[tokio::test]
    async fn test_substitution_disabled_keeps_references() {
        let content = r#"
[[targets]]
name = "cache"
kind = "redis"
host = "${NOT_SUBSTITUTED}"
"#;
        let config = TomlConfigLoader::new(false)
            .load_from_string(content)
            .await
            .unwrap();
        assert_eq!(config.targets[0].host, "${NOT_SUBSTITUTED}");
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        let path = path.to_string_lossy();
        assert!(path.ends_with(CONFIG_FILE_NAME) || path.contains("service-probe"));
    }
}
