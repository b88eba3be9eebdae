// Configuration layering: defaults, nebula.toml, NEBULA_* environment
use crate::config::NebulaConfig;
use crate::errors::NebulaError;
use figment::Jail;
use std::path::PathBuf;

#[test]
pub fn defaults_apply_without_file_or_env() {
    Jail::expect_with(|_jail| {
        let config = NebulaConfig::load(None).map_err(|e| e.to_string())?;
        assert_eq!(config.log_level, "info");
        assert_eq!(config.ping_count, 4);
        assert_eq!(config.export_dir, PathBuf::from("."));
        assert!(config.db_path.ends_with("logs.sled") || config.db_path.ends_with("nebula_logs.sled"));
        Ok(())
    });
}

#[test]
pub fn toml_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "nebula.toml",
            r#"
                db_path = "data/events.sled"
                export_dir = "reports"
                log_level = "debug"
            "#,
        )?;

        let config = NebulaConfig::load(None).map_err(|e| e.to_string())?;
        assert_eq!(config.db_path, PathBuf::from("data/events.sled"));
        assert_eq!(config.export_dir, PathBuf::from("reports"));
        assert_eq!(config.tracing_level().unwrap(), tracing::Level::DEBUG);
        Ok(())
    });
}

#[test]
pub fn environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("custom.toml", "ping_count = 10")?;
        jail.set_env("NEBULA_CONFIG", "custom.toml");
        jail.set_env("NEBULA_LOG_LEVEL", "warn");

        let config = NebulaConfig::load(None).map_err(|e| e.to_string())?;
        assert_eq!(config.ping_count, 10);
        assert_eq!(config.log_level, "warn");
        Ok(())
    });
}

#[test]
pub fn invalid_log_level_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("NEBULA_LOG_LEVEL", "chatty");

        let err = NebulaConfig::load(None).unwrap_err();
        assert!(matches!(err, NebulaError::Config { .. }));
        assert!(err.to_string().contains("chatty"));
        Ok(())
    });
}

#[test]
pub fn empty_db_path_fails() {
    Jail::expect_with(|jail| {
        jail.create_file("nebula.toml", r#"db_path = """#)?;

        let result = NebulaConfig::load(None);
        assert!(matches!(result, Err(NebulaError::Config { .. })));
        Ok(())
    });
}

#[test]
pub fn zero_ping_count_is_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("NEBULA_PING_COUNT", "0");

        let err = NebulaConfig::load(None).unwrap_err();
        assert!(err.to_string().contains("ping_count"));
        Ok(())
    });
}
