//! 环境变量目标解析
//!
//! 从 `REDIS_HOST`/`REDIS_PORT`、`MYSQL_HOST`/`MYSQL_PORT` 解析探测目标。
//! 查找函数由调用方传入，探测器本身不读取任何进程级状态。

use crate::config::types::{Config, GlobalConfig};
use crate::error::{ConfigError, Result};
use crate::probe::{ProbeKind, ProbeTarget};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// 单个协议的环境变量名和默认值
struct EnvBinding {
    kind: ProbeKind,
    host_var: &'static str,
    port_var: &'static str,
    default_host: &'static str,
}

const ENV_BINDINGS: [EnvBinding; 2] = [
    EnvBinding {
        kind: ProbeKind::Redis,
        host_var: "REDIS_HOST",
        port_var: "REDIS_PORT",
        default_host: "redis",
    },
    EnvBinding {
        kind: ProbeKind::Mysql,
        host_var: "MYSQL_HOST",
        port_var: "MYSQL_PORT",
        default_host: "mysql",
    },
];

/// 环境变量目标解析器
pub struct EnvTargets;

impl EnvTargets {
    /// 使用给定的查找函数解析目标
    ///
    /// 空值视为未设置；无法解析的端口回退到默认端口并记录警告。
    pub fn resolve<F>(lookup: F, global: &GlobalConfig) -> Vec<ProbeTarget>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        ENV_BINDINGS
            .iter()
            .map(|binding| {
                let host = lookup(binding.host_var)
                    .map(|host| host.trim().to_string())
                    .unwrap_or_else(|| binding.default_host.to_string());

                let default_port = binding.kind.default_port();
                let port = match lookup(binding.port_var) {
                    Some(raw) => match raw.trim().parse::<u16>() {
                        Ok(port) if port != 0 => port,
                        _ => {
                            warn!(
                                "环境变量 {} 的值无效: {}，使用默认端口 {}",
                                binding.port_var, raw, default_port
                            );
                            default_port
                        }
                    },
                    None => default_port,
                };

                ProbeTarget::new(binding.kind.to_string(), binding.kind, host, port)
                    .with_timeouts(global.connect_timeout(), global.read_timeout())
            })
            .collect()
    }
}

/// 进程环境变量加 dotenv 文件的查找源，进程环境变量优先
///
/// dotenv 中的变量只保存在查找源内，不写入进程环境。
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    dotenv: HashMap<String, String>,
}

impl EnvSource {
    /// 只使用进程环境变量
    pub fn process() -> Self {
        Self::default()
    }

    /// 加载 dotenv 文件，文件不存在时只使用进程环境变量
    ///
    /// 支持引号、`export` 前缀和行尾注释；无法解析的行被跳过。
    pub fn with_dotenv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let entries = match dotenvy::from_path_iter(path) {
            Ok(entries) => entries,
            Err(e) if e.not_found() => {
                debug!("dotenv 文件不存在，跳过: {}", path.display());
                return Ok(Self::process());
            }
            Err(e) => {
                return Err(ConfigError::ParseError(format!(
                    "读取 dotenv 文件 {} 失败: {}",
                    path.display(),
                    e
                ))
                .into())
            }
        };

        Ok(entries
            .filter_map(|entry| {
                entry
                    .inspect_err(|e| warn!("忽略 {} 中无法解析的行: {}", path.display(), e))
                    .ok()
            })
            .collect())
    }

    /// 查找变量
    pub fn get(&self, key: &str) -> Option<String> {
        std::env::var(key)
            .ok()
            .filter(|value| !value.is_empty())
            .or_else(|| self.dotenv.get(key).cloned())
    }
}

impl FromIterator<(String, String)> for EnvSource {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            dotenv: iter.into_iter().collect(),
        }
    }
}

impl GlobalConfig {
    /// 按 `env_file` 构造变量查找源
    pub fn env_source(&self) -> Result<EnvSource> {
        match &self.env_file {
            Some(path) => EnvSource::with_dotenv(path),
            None => Ok(EnvSource::process()),
        }
    }
}

impl Config {
    /// 解析最终的探测目标列表
    ///
    /// 包含所有启用的配置目标；开启 `use_env_targets` 时再追加名称未被
    /// 配置占用的环境变量目标。
    pub fn resolve_targets<F>(&self, lookup: F) -> Vec<ProbeTarget>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut targets: Vec<ProbeTarget> = self
            .targets
            .iter()
            .filter(|target| target.enabled)
            .map(|target| target.to_target(&self.global))
            .collect();

        if self.global.use_env_targets {
            let configured: Vec<&str> = self.targets.iter().map(|t| t.name.as_str()).collect();
            targets.extend(
                EnvTargets::resolve(lookup, &self.global)
                    .into_iter()
                    .filter(|target| !configured.contains(&target.name.as_str())),
            );
        }

        targets
    }

    /// 使用进程环境变量和配置的 dotenv 文件解析目标
    pub fn resolve_targets_from_env(&self) -> Result<Vec<ProbeTarget>> {
        let source = self.global.env_source()?;
        Ok(self.resolve_targets(|key| source.get(key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::TargetConfig;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let targets = EnvTargets::resolve(lookup_from(&[]), &GlobalConfig::default());

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].kind, ProbeKind::Redis);
        assert_eq!(targets[0].address(), "redis:6379");
        assert_eq!(targets[1].kind, ProbeKind::Mysql);
        assert_eq!(targets[1].address(), "mysql:3306");
        assert_eq!(targets[0].connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_env_overrides() {
        let lookup = lookup_from(&[
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("MYSQL_HOST", "  db.internal "),
        ]);
        let targets = EnvTargets::resolve(lookup, &GlobalConfig::default());

        assert_eq!(targets[0].address(), "cache.internal:6380");
        assert_eq!(targets[1].address(), "db.internal:3306");
    }

    #[test]
    fn test_empty_and_invalid_values_fall_back() {
        let lookup = lookup_from(&[
            ("REDIS_HOST", ""),
            ("REDIS_PORT", "not-a-port"),
            ("MYSQL_PORT", "0"),
        ]);
        let targets = EnvTargets::resolve(lookup, &GlobalConfig::default());

        assert_eq!(targets[0].address(), "redis:6379");
        assert_eq!(targets[1].address(), "mysql:3306");
    }

    #[test]
    fn test_dotenv_quotes_export_and_comments() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "# comment\nSERVICE_PROBE_TEST_QUOTED=\"cache\"\nexport SERVICE_PROBE_TEST_EXPORTED=db\nSERVICE_PROBE_TEST_PORT=6380 # replica\nINVALID LINE\nSERVICE_PROBE_TEST_PASSWORD='a=b'\n"
        )
        .unwrap();

        let source = EnvSource::with_dotenv(file.path()).unwrap();
        assert_eq!(
            source.get("SERVICE_PROBE_TEST_QUOTED").as_deref(),
            Some("cache")
        );
        assert_eq!(
            source.get("SERVICE_PROBE_TEST_EXPORTED").as_deref(),
            Some("db")
        );
        assert_eq!(
            source.get("SERVICE_PROBE_TEST_PORT").as_deref(),
            Some("6380")
        );
        assert_eq!(
            source.get("SERVICE_PROBE_TEST_PASSWORD").as_deref(),
            Some("a=b")
        );
    }

    #[test]
    fn test_env_file_targets_strip_quotes() {
        if std::env::var("MYSQL_HOST").is_ok() || std::env::var("MYSQL_PORT").is_ok() {
            return;
        }
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "MYSQL_HOST=\"orders.internal\"").unwrap();
        writeln!(file, "MYSQL_PORT=3307 # 从库").unwrap();

        let mut config = Config::default();
        config.global.env_file = Some(file.path().to_path_buf());
        let targets = config.resolve_targets_from_env().unwrap();

        let mysql = targets.iter().find(|t| t.kind == ProbeKind::Mysql).unwrap();
        assert_eq!(mysql.address(), "orders.internal:3307");
    }

    #[test]
    fn test_env_source_reads_dotenv_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "SERVICE_PROBE_TEST_ONLY_IN_DOTENV=from-file").unwrap();

        let source = EnvSource::with_dotenv(file.path()).unwrap();
        assert_eq!(
            source.get("SERVICE_PROBE_TEST_ONLY_IN_DOTENV").as_deref(),
            Some("from-file")
        );
        assert!(source.get("SERVICE_PROBE_TEST_MISSING").is_none());
    }

    #[test]
    fn test_env_source_missing_file() {
        let source = EnvSource::with_dotenv("/nonexistent/service-probe/.env").unwrap();
        assert!(source.get("SERVICE_PROBE_TEST_MISSING").is_none());
    }

    #[test]
    fn test_resolve_targets_merges_config_and_env() {
        let config = Config {
            global: GlobalConfig::default(),
            targets: vec![
                TargetConfig {
                    name: "redis".to_string(),
                    kind: ProbeKind::Redis,
                    host: "configured-redis".to_string(),
                    port: Some(7000),
                    connect_timeout_ms: None,
                    read_timeout_ms: None,
                    enabled: true,
                    description: None,
                },
                TargetConfig {
                    name: "disabled".to_string(),
                    kind: ProbeKind::Mysql,
                    host: "old-db".to_string(),
                    port: None,
                    connect_timeout_ms: None,
                    read_timeout_ms: None,
                    enabled: false,
                    description: None,
                },
            ],
        };

        let targets = config.resolve_targets(lookup_from(&[("MYSQL_HOST", "db")]));
        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();

        // 配置中的 redis 覆盖环境变量目标，禁用的目标被排除
        assert_eq!(names, vec!["redis", "mysql"]);
        assert_eq!(targets[0].address(), "configured-redis:7000");
        assert_eq!(targets[1].address(), "db:3306");
    }

    #[test]
    fn test_resolve_targets_without_env() {
        let mut config = Config::default();
        config.global.use_env_targets = false;

        assert!(config.resolve_targets(lookup_from(&[])).is_empty());
    }
}
