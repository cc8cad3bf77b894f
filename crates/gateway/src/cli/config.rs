use dq_domain::config::{Component, Config, ConfigError, ConfigSeverity};

/// Print every issue found for the gateway.
///
/// Returns `true` when there are no errors (warnings are allowed).
pub fn validate(config: &Config, overlay_issues: &[ConfigError]) -> bool {
    let mut issues = overlay_issues.to_vec();
    issues.extend(config.validate(Component::Gateway));

    if issues.is_empty() {
        println!("Config OK");
        return true;
    }

    let error_count = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    let warning_count = issues.len() - error_count;

    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s)");

    error_count == 0
}

/// Dump the resolved config (defaults filled in, keys removed) as JSON.
pub fn show(config: &Config) -> anyhow::Result<()> {
    let output = serde_json::to_string_pretty(&config.redacted())?;
    println!("{output}");
    Ok(())
}
