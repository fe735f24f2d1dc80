use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Web endpoint carries a fixed principal
/// - Path prefixes are absolute
/// - Intervals and the retention window are nonzero
/// - Provisioning command and admin identity come together
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.destinations.web.principal.is_none() {
        return Err(ConfigError::ValidationError(
            "destinations.web.principal is required".to_string(),
        ));
    }

    for (name, profile) in [
        ("web", &config.destinations.web),
        ("federated", &config.destinations.federated),
        ("sftp", &config.destinations.sftp),
    ] {
        if profile.host.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "destinations.{}.host cannot be empty",
                name
            )));
        }
        if !profile.path_prefix.is_absolute() {
            return Err(ConfigError::ValidationError(format!(
                "destinations.{}.path_prefix must be absolute",
                name
            )));
        }
    }

    if config.orchestrator.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.orchestrator.retention_days == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.retention_days cannot be 0".to_string(),
        ));
    }
    if config.reaper.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "reaper.sweep_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.remote.provision_cmd.is_some() != config.remote.provision_admin.is_some() {
        return Err(ConfigError::ValidationError(
            "remote.provision_cmd and remote.provision_admin must be set together".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn valid_config() -> Config {
        load_config_from_str(
            r#"
[destinations.web]
principal = "webstage"
host = "web.internal"
path_prefix = "/srv/web/projects"

[destinations.federated]
host = "gridftp.internal"
path_prefix = "/home"

[destinations.sftp]
host = "sftp.internal"
path_prefix = "/srv/sftp"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_web_principal_fails() {
        let mut config = valid_config();
        config.destinations.web.principal = None;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_relative_prefix_fails() {
        let mut config = valid_config();
        config.destinations.sftp.path_prefix = "srv/sftp".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_poll_interval_fails() {
        let mut config = valid_config();
        config.orchestrator.poll_interval_secs = 0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_provisioning_must_be_paired() {
        let mut config = valid_config();
        config.remote.provision_cmd = Some("create-home {principal}".to_string());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));

        config.remote.provision_admin = Some("admin".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
