/// Whether `environment` names a production deployment.
pub fn is_production(environment: &str) -> bool {
    matches!(
        environment.trim().to_ascii_lowercase().as_str(),
        "production" | "prod"
    )
}

/// Whether a destructive command may run without asking the operator first.
///
/// Outside production this is always true; in production only `--force` skips the prompt.
pub fn should_proceed(environment: &str, force: bool) -> bool {
    force || !is_production(environment)
}
