//! 配置加载与目标解析测试

use service_probe::config::{ConfigLoader, EnvSource, TomlConfigLoader};
use service_probe::probe::ProbeKind;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
[global]
log_level = "debug"
connect_timeout_ms = 1500
read_timeout_ms = 800

[[targets]]
name = "redis"
kind = "redis"
host = "cache.internal"
read_timeout_ms = 300

[[targets]]
name = "orders-db"
kind = "mysql"
host = "orders.internal"
port = 3307

[[targets]]
name = "legacy"
kind = "mysql"
host = "legacy.internal"
enabled = false
"#;

#[tokio::test]
async fn test_file_targets_merge_with_environment() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = TomlConfigLoader::new(false)
        .load_from_file(file.path())
        .await
        .unwrap();

    let env: HashMap<&str, &str> = HashMap::from([("MYSQL_HOST", "db.env"), ("MYSQL_PORT", "3310")]);
    let targets = config.resolve_targets(|key| env.get(key).map(|v| v.to_string()));

    let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["redis", "orders-db", "mysql"]);

    // 配置文件中的 redis 目标覆盖环境变量目标
    assert_eq!(targets[0].address(), "cache.internal:6379");
    assert_eq!(targets[0].connect_timeout, Duration::from_millis(1500));
    assert_eq!(targets[0].read_timeout, Duration::from_millis(300));

    assert_eq!(targets[1].kind, ProbeKind::Mysql);
    assert_eq!(targets[1].address(), "orders.internal:3307");
    assert_eq!(targets[1].read_timeout, Duration::from_millis(800));

    assert_eq!(targets[2].address(), "db.env:3310");
    assert_eq!(targets[2].read_timeout, Duration::from_millis(800));
}

#[test]
fn test_dotenv_source() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# 测试环境").unwrap();
    writeln!(file, "SERVICE_PROBE_TEST_ONLY_HOST = from-dotenv").unwrap();
    writeln!(file, "not a pair").unwrap();

    let source = EnvSource::with_dotenv(file.path()).unwrap();
    assert_eq!(
        source.get("SERVICE_PROBE_TEST_ONLY_HOST").as_deref(),
        Some("from-dotenv")
    );
    assert!(source.get("SERVICE_PROBE_TEST_ONLY_MISSING").is_none());
}

#[tokio::test]
async fn test_duplicate_target_names_rejected() {
    let content = r#"
[[targets]]
name = "cache"
kind = "redis"
host = "a"

[[targets]]
name = "cache"
kind = "redis"
host = "b"
"#;

    let err = TomlConfigLoader::new(false)
        .load_from_string(content)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("目标名称重复"));
}
