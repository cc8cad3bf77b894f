use std::fmt::Display;
use std::str::FromStr;

use super::{ConfigError, ConfigSeverity};

/// Applies environment variables on top of an already-populated config.
///
/// Invalid values never fail the load: the previous value is kept, a
/// warning is logged, and a [`ConfigSeverity::Warning`] issue is recorded.
pub(crate) struct EnvOverlay<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    pub(crate) issues: Vec<ConfigError>,
}

impl<'a> EnvOverlay<'a> {
    pub(crate) fn new(lookup: &'a dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            lookup,
            issues: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub(crate) fn string(&mut self, key: &str, target: &mut String) {
        if let Some(v) = self.get(key) {
            *target = v;
        }
    }

    pub(crate) fn opt_string(&mut self, key: &str, target: &mut Option<String>) {
        if let Some(v) = self.get(key) {
            *target = Some(v);
        }
    }

    pub(crate) fn parse<T>(&mut self, key: &str, target: &mut T)
    where
        T: FromStr + Display,
    {
        let Some(raw) = self.get(key) else { return };
        match raw.parse::<T>() {
            Ok(v) => *target = v,
            Err(_) => self.invalid(key, &raw, &*target),
        }
    }

    pub(crate) fn flag(&mut self, key: &str, target: &mut bool) {
        let Some(raw) = self.get(key) else { return };
        match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => *target = true,
            "false" | "0" | "no" | "off" => *target = false,
            _ => self.invalid(key, &raw, &*target),
        }
    }

    fn invalid(&mut self, key: &str, raw: &str, kept: &dyn Display) {
        tracing::warn!(key, value = raw, "Invalid {key}, using default: {kept}");
        self.issues.push(ConfigError {
            severity: ConfigSeverity::Warning,
            field: key.to_string(),
            message: format!("invalid value {raw:?}, using default: {kept}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn parse_keeps_default_on_garbage() {
        let lookup = lookup_from(&[("LLM_MAX_TOKENS", "lots")]);
        let mut overlay = EnvOverlay::new(&lookup);
        let mut max_tokens = 3000u32;
        overlay.parse("LLM_MAX_TOKENS", &mut max_tokens);
        assert_eq!(max_tokens, 3000);
        assert_eq!(overlay.issues.len(), 1);
        assert_eq!(overlay.issues[0].severity, ConfigSeverity::Warning);
        assert_eq!(overlay.issues[0].field, "LLM_MAX_TOKENS");
    }

    #[test]
    fn parse_accepts_padded_numbers() {
        let lookup = lookup_from(&[("LLM_TEMPERATURE", " 0.7 ")]);
        let mut overlay = EnvOverlay::new(&lookup);
        let mut temp = 0.1f32;
        overlay.parse("LLM_TEMPERATURE", &mut temp);
        assert!((temp - 0.7).abs() < f32::EPSILON);
        assert!(overlay.issues.is_empty());
    }

    #[test]
    fn empty_value_is_ignored() {
        let lookup = lookup_from(&[("MCP_SERVER_URL", "  ")]);
        let mut overlay = EnvOverlay::new(&lookup);
        let mut url = "http://127.0.0.1:8001/mcp".to_string();
        overlay.string("MCP_SERVER_URL", &mut url);
        assert_eq!(url, "http://127.0.0.1:8001/mcp");
    }

    #[test]
    fn flag_variants() {
        let lookup = lookup_from(&[("A", "TRUE"), ("B", "0"), ("C", "maybe")]);
        let mut overlay = EnvOverlay::new(&lookup);
        let (mut a, mut b, mut c) = (false, true, false);
        overlay.flag("A", &mut a);
        overlay.flag("B", &mut b);
        overlay.flag("C", &mut c);
        assert!(a);
        assert!(!b);
        assert!(!c);
        assert_eq!(overlay.issues.len(), 1);
    }
}
