//! Load: agent settings from the environment, monitor configuration from
//! a JSON file of any supported text encoding.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::model::{AgentConfig, EtwProvider, EtwSource, LoggerSettings, SourceConfig};
use super::ConfigError;
use crate::monitor::EventLevel;
use crate::text::{self, Encoding, Evidence};

impl AgentConfig {
    /// Defaults overridden by `LOGMONITOR_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = AgentConfig::default();
        if let Some(path) = lookup("LOGMONITOR_CONFIG") {
            config.config_path = PathBuf::from(path);
        }
        if let Some(tag) = lookup("LOGMONITOR_TAG") {
            config.component_tag = tag;
        }
        if let Some(flag) = lookup("LOGMONITOR_TRACE_WRITE_ERRORS").and_then(|s| s.parse().ok()) {
            config.trace_write_errors = flag;
        }
        if let Some(path) = lookup("LOGMONITOR_REPLAY") {
            config.replay_path = Some(PathBuf::from(path));
        }
        config
    }

    /// Check values that would make the agent misbehave.
    pub fn validate(&self) -> Result<(), String> {
        if self.config_path.as_os_str().is_empty() {
            return Err("config_path must not be empty".to_string());
        }
        if self.component_tag.is_empty() {
            return Err("component_tag must not be empty".to_string());
        }
        if self.component_tag.contains([']', '\r', '\n']) {
            return Err(format!("component_tag contains a forbidden character: {:?}", self.component_tag));
        }
        Ok(())
    }
}

impl LoggerSettings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse a configuration stored as UTF-8, UTF-16 or single-byte text.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let contents = text::decode(bytes, wide_config_encoding(bytes)).to_utf8();
        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(contents)?;
        let log_config = field(&document, "LogConfig").ok_or(ConfigError::Missing("LogConfig"))?;
        let sources = field(log_config, "sources")
            .and_then(Value::as_array)
            .ok_or(ConfigError::Missing("LogConfig.sources"))?;

        let sources = sources
            .iter()
            .enumerate()
            .map(|(index, source)| {
                parse_source(source).map_err(|reason| ConfigError::InvalidSource { index, reason })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LoggerSettings { sources })
    }
}

/// BOM-less UTF-16 of plain ASCII is also valid UTF-8, so a config file
/// with NUL bytes is checked for 16-bit structure before classification.
fn wide_config_encoding(bytes: &[u8]) -> Option<Encoding> {
    if !bytes.contains(&0) {
        return None;
    }
    let verdict = text::is_text_unicode(bytes);
    let structural = Evidence::ASCII16 | Evidence::REVERSE_ASCII16 | Evidence::CONTROLS | Evidence::REVERSE_CONTROLS;
    if !verdict.is_unicode || !verdict.evidence.intersects(structural) {
        return None;
    }
    Some(if verdict.big_endian { Encoding::Utf16Be } else { Encoding::Utf16Le })
}

/// Case-insensitive object member lookup.
fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    let object: &Map<String, Value> = value.as_object()?;
    object
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

fn string_field(value: &Value, name: &str) -> Result<Option<String>, String> {
    match field(value, name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => Err(format!("'{}' must be a string, got {}", name, other)),
    }
}

fn parse_source(source: &Value) -> Result<SourceConfig, String> {
    if !source.is_object() {
        return Err("source must be an object".to_string());
    }
    let kind = string_field(source, "type")?.ok_or_else(|| "missing 'type'".to_string())?;

    Ok(match kind.to_ascii_lowercase().as_str() {
        "etw" => SourceConfig::Etw(parse_etw(source)?),
        "eventlog" => SourceConfig::EventLog,
        "file" => SourceConfig::File,
        "process" => SourceConfig::Process,
        _ => SourceConfig::Unknown(kind),
    })
}

fn parse_etw(source: &Value) -> Result<EtwSource, String> {
    let providers = field(source, "providers")
        .and_then(Value::as_array)
        .ok_or_else(|| "ETW source needs a 'providers' array".to_string())?;
    if providers.is_empty() {
        return Err("ETW source needs at least one provider".to_string());
    }

    let providers = providers
        .iter()
        .enumerate()
        .map(|(index, provider)| {
            parse_provider(provider).map_err(|reason| format!("provider #{}: {}", index, reason))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(EtwSource { providers })
}

fn parse_provider(provider: &Value) -> Result<EtwProvider, String> {
    if !provider.is_object() {
        return Err("provider must be an object".to_string());
    }
    let provider_name = string_field(provider, "providerName")?;
    let provider_guid = string_field(provider, "providerGuid")?;
    if provider_name.is_none() && provider_guid.is_none() {
        return Err("needs 'providerName' or 'providerGuid'".to_string());
    }

    let level = match string_field(provider, "level")? {
        Some(level) => level.parse::<EventLevel>()?,
        None => EventLevel::default(),
    };
    let keywords = match field(provider, "keywords") {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| format!("keywords out of range: {}", n))?,
        Some(Value::String(s)) => parse_keywords(s)?,
        Some(other) => return Err(format!("'keywords' must be a number or string, got {}", other)),
    };

    Ok(EtwProvider { provider_name, provider_guid, level, keywords })
}

/// Decimal or `0x`-prefixed hexadecimal keyword mask.
fn parse_keywords(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid keywords '{}': {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "LogConfig": {
            "sources": [
                {
                    "type": "ETW",
                    "providers": [
                        { "providerName": "Microsoft-Windows-WinINet", "level": "Verbose", "keywords": "0x10" },
                        { "providerGuid": "{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}" }
                    ]
                },
                { "type": "File", "directory": "c:\\inetpub\\logs", "filter": "*.log" },
                { "type": "EventLog", "channels": [] },
                { "type": "Syslog" }
            ]
        }
    }"#;

    fn utf16le_with_bom(s: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(s.encode_utf16().flat_map(|u| u.to_le_bytes()));
        bytes
    }

    // ── AgentConfig ─────────────────────────────────────────────

    #[test]
    fn test_from_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("LOGMONITOR_CONFIG", "/tmp/lm.json"),
            ("LOGMONITOR_TAG", "AGENT"),
            ("LOGMONITOR_TRACE_WRITE_ERRORS", "true"),
        ]
        .into_iter()
        .collect();
        let cfg = AgentConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.config_path, PathBuf::from("/tmp/lm.json"));
        assert_eq!(cfg.component_tag, "AGENT");
        assert!(cfg.trace_write_errors);
        assert!(cfg.replay_path.is_none());
    }

    #[test]
    fn test_from_lookup_invalid_flag_ignored() {
        let cfg = AgentConfig::from_lookup(|k| (k == "LOGMONITOR_TRACE_WRITE_ERRORS").then(|| "yes".to_string()));
        assert!(!cfg.trace_write_errors);
    }

    #[test]
    fn test_validate_rejects_bad_tag() {
        let mut cfg = AgentConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.component_tag = "A]B".to_string();
        assert!(cfg.validate().unwrap_err().contains("component_tag"));
        cfg.component_tag = String::new();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let cfg = AgentConfig { config_path: PathBuf::new(), ..AgentConfig::default() };
        assert!(cfg.validate().unwrap_err().contains("config_path"));
    }

    // ── LoggerSettings ──────────────────────────────────────────

    #[test]
    fn test_parse_sample() {
        let settings = LoggerSettings::from_json(SAMPLE).unwrap();
        assert_eq!(settings.sources.len(), 4);

        let SourceConfig::Etw(etw) = &settings.sources[0] else {
            panic!("first source should be ETW");
        };
        assert_eq!(etw.providers.len(), 2);
        assert_eq!(etw.providers[0].provider_name.as_deref(), Some("Microsoft-Windows-WinINet"));
        assert_eq!(etw.providers[0].level, EventLevel::Verbose);
        assert_eq!(etw.providers[0].keywords, 0x10);
        assert_eq!(
            etw.providers[1].provider_guid.as_deref(),
            Some("{22fb2cd6-0e7b-422b-a0c7-2fad1fd0e716}")
        );
        assert_eq!(etw.providers[1].level, EventLevel::Error);

        assert_eq!(settings.sources[1], SourceConfig::File);
        assert_eq!(settings.sources[2], SourceConfig::EventLog);
        assert_eq!(settings.sources[3], SourceConfig::Unknown("Syslog".to_string()));
    }

    #[test]
    fn test_keys_and_type_case_insensitive() {
        let json = r#"{"logconfig": {"Sources": [{"Type": "etw", "Providers": [{"ProviderGuid": "x", "Keywords": 12}]}]}}"#;
        let settings = LoggerSettings::from_json(json).unwrap();
        let SourceConfig::Etw(etw) = &settings.sources[0] else {
            panic!("expected ETW");
        };
        assert_eq!(etw.providers[0].provider_guid.as_deref(), Some("x"));
        assert_eq!(etw.providers[0].keywords, 12);
    }

    #[test]
    fn test_malformed_guid_is_not_a_config_error() {
        let json = r#"{"LogConfig": {"sources": [{"type": "ETW", "providers": [{"providerGuid": "not-a-guid"}]}]}}"#;
        assert!(LoggerSettings::from_json(json).is_ok());
    }

    #[test]
    fn test_missing_log_config() {
        let err = LoggerSettings::from_json(r#"{"sources": []}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("LogConfig")));
    }

    #[test]
    fn test_missing_sources() {
        let err = LoggerSettings::from_json(r#"{"LogConfig": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("LogConfig.sources")));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(LoggerSettings::from_json("{ nope"), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_etw_without_providers_rejected() {
        let json = r#"{"LogConfig": {"sources": [{"type": "File"}, {"type": "ETW", "providers": []}]}}"#;
        let err = LoggerSettings::from_json(json).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSource { index: 1, .. }));
    }

    #[test]
    fn test_provider_without_identifier_rejected() {
        let json = r#"{"LogConfig": {"sources": [{"type": "ETW", "providers": [{"level": "Warning"}]}]}}"#;
        let err = LoggerSettings::from_json(json).unwrap_err();
        assert!(err.to_string().contains("providerName"));
    }

    #[test]
    fn test_bad_level_rejected() {
        let json = r#"{"LogConfig": {"sources": [{"type": "ETW", "providers": [{"providerName": "a", "level": "Loud"}]}]}}"#;
        let err = LoggerSettings::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unknown level"));
    }

    #[test]
    fn test_source_without_type_rejected() {
        let json = r#"{"LogConfig": {"sources": [{"providers": []}]}}"#;
        let err = LoggerSettings::from_json(json).unwrap_err();
        assert!(err.to_string().contains("missing 'type'"));
    }

    #[test]
    fn test_parse_keywords_forms() {
        assert_eq!(parse_keywords("0xFF"), Ok(255));
        assert_eq!(parse_keywords("0X10"), Ok(16));
        assert_eq!(parse_keywords(" 42 "), Ok(42));
        assert!(parse_keywords("0xZZ").is_err());
    }

    #[test]
    fn test_from_bytes_utf16_file() {
        let settings = LoggerSettings::from_bytes(&utf16le_with_bom(SAMPLE)).unwrap();
        assert_eq!(settings.sources.len(), 4);
    }

    #[test]
    fn test_from_bytes_utf16le_without_bom() {
        let json = r#"{"LogConfig":{"sources":[{"type":"File"}]}}"#;
        let bytes: Vec<u8> = json.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let settings = LoggerSettings::from_bytes(&bytes).unwrap();
        assert_eq!(settings.sources, vec![SourceConfig::File]);
    }

    #[test]
    fn test_from_bytes_utf16be_without_bom() {
        let bytes: Vec<u8> = SAMPLE.encode_utf16().flat_map(|u| u.to_be_bytes()).collect();
        let settings = LoggerSettings::from_bytes(&bytes).unwrap();
        assert_eq!(settings.sources.len(), 4);
    }

    #[test]
    fn test_wide_config_encoding_ignores_plain_utf8() {
        assert_eq!(wide_config_encoding(SAMPLE.as_bytes()), None);
    }

    #[test]
    fn test_from_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let settings = LoggerSettings::from_file(file.path()).unwrap();
        assert_eq!(settings.sources.len(), 4);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoggerSettings::from_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
