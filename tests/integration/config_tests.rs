use figment::providers::Serialized;
use figment::{Figment, Jail};
use hashdupe::config::Config;
use hashdupe::duplicates::{FinderConfig, FinderError};
use hashdupe::error::ValidationError;
use hashdupe::logging::Logger;
use std::path::{Path, PathBuf};

#[test]
fn test_config_defaults_extract() {
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.io_threads, 4);
    assert_eq!(config.algorithm, "sha256");
    assert!(config.extensions.is_none());
}

#[test]
fn test_config_load_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "hashdupe.toml",
            r#"
extensions = ["mp4", "jpg"]
parallel = false
algorithm = "blake3"
io_threads = 8
cache_path = "custom/cache.db"
"#,
        )?;

        let config = Config::load(Some(Path::new("hashdupe.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.extensions, Some(vec!["mp4".to_string(), "jpg".to_string()]));
        assert!(!config.parallel);
        assert!(config.multi_stage);
        assert_eq!(config.algorithm, "blake3");
        assert_eq!(config.io_threads, 8);
        assert_eq!(config.cache_path, Some(PathBuf::from("custom/cache.db")));
        Ok(())
    });
}

#[test]
fn test_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("hashdupe.toml", "io_threads = 8\nalgorithm = \"sha512\"\n")?;
        jail.set_env("HASHDUPE_IO_THREADS", "2");
        jail.set_env("HASHDUPE_CPU_POOL", "true");

        let config = Config::load(Some(Path::new("hashdupe.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.io_threads, 2);
        assert!(config.cpu_pool);
        assert_eq!(config.algorithm, "sha512");
        Ok(())
    });
}

#[test]
fn test_load_rejects_invalid_values() {
    Jail::expect_with(|jail| {
        jail.create_file("bad.toml", "algorithm = \"md5\"\n")?;
        let err = Config::load(Some(Path::new("bad.toml"))).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::UnsupportedAlgorithm { .. })
        ));

        jail.create_file("zero.toml", "io_threads = 0\n")?;
        assert!(Config::load(Some(Path::new("zero.toml"))).is_err());
        Ok(())
    });
}

#[test]
fn test_load_missing_explicit_file() {
    Jail::expect_with(|_jail| {
        assert!(Config::load(Some(Path::new("nope.toml"))).is_err());
        Ok(())
    });
}

#[test]
fn test_save_round_trip() {
    Jail::expect_with(|jail| {
        let config = Config {
            extensions: Some(vec![".png".to_string()]),
            io_threads: 3,
            accelerated_io: Some(false),
            ..Config::default()
        };
        let path = jail.directory().join("nested").join("saved.toml");
        config.save(&path).map_err(|e| e.to_string())?;

        let loaded = Config::load(Some(&path)).map_err(|e| e.to_string())?;
        assert_eq!(loaded.extensions, config.extensions);
        assert_eq!(loaded.io_threads, 3);
        assert_eq!(loaded.accelerated_io, Some(false));
        Ok(())
    });
}

#[test]
fn test_finder_config_rejects_blank_extension() {
    let config = Config {
        extensions: Some(vec![String::new()]),
        cache_enabled: false,
        ..Config::default()
    };
    let result = FinderConfig::from_config(&config, &Logger::discard());
    assert!(matches!(
        result,
        Err(FinderError::Validation(ValidationError::EmptyExtension))
    ));
}

#[test]
fn test_finder_config_without_cache() {
    let config = Config {
        cache_enabled: false,
        parallel: false,
        ..Config::default()
    };
    let finder_config = FinderConfig::from_config(&config, &Logger::discard()).unwrap();
    assert!(finder_config.cache.is_none());
    assert!(!finder_config.parallel);
    assert_eq!(finder_config.hasher.algorithm().name(), "sha256");
}
