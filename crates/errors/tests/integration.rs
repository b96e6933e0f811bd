//! Integration tests for error types

#[cfg(test)]
mod tests {
    use cmh_errors::*;

    #[test]
    fn test_error_conversion() {
        let pool_err = PoolError::NotHolder {
            resource: 2,
            process: 1,
            holder: Some(3),
        };
        let err: Error = pool_err.into();
        assert!(matches!(err, Error::Pool(_)));
        assert!(is_operator_visible(&err));
    }

    #[test]
    fn test_error_display() {
        let err = PoolError::NotHolder {
            resource: 2,
            process: 1,
            holder: None,
        };
        assert_eq!(
            err.to_string(),
            "process P1 released R2 but is not its holder (holder: none)"
        );

        let err = ConfigError::invalid("num_processes", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: num_processes must be at least 1"
        );
    }

    #[test]
    fn test_routing_failure_is_not_operator_visible() {
        let err: Error = ProbeError::InboxClosed { process: 4 }.into();
        assert!(!is_operator_visible(&err));
        assert_eq!(err.user_code(), Some("error.probe"));
    }

    #[test]
    fn test_user_facing_hint() {
        let err: Error = ConfigError::invalid("num_resources", "must be at least 1").into();
        assert_eq!(err.user_code(), Some("config.invalid_configuration"));
        assert!(err.user_hint().is_some());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_clone() {
        let err = PoolError::UnknownResource { resource: 9 };
        let cloned = err.clone();
        assert_eq!(err, cloned);
    }
}
