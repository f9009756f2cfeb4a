/*
[INPUT]:  YAML configuration file, --base-url flag, --header flags
[OUTPUT]: TaskerConfig and request headers for the CLI
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding configuration options or flag formats
*/

use anyhow::{Context, Result, anyhow, bail};
use std::path::Path;
use tasker_client::{HeaderMap, HeaderName, HeaderValue, TaskerConfig};
use url::Url;

/// Load configuration from a YAML file, a base URL, or both (the flag wins)
pub fn load_config(path: Option<&Path>, base_url: Option<&str>) -> Result<TaskerConfig> {
    let config = match (path, base_url) {
        (Some(path), base_url) => {
            let mut config = from_file(path)?;
            if let Some(base_url) = base_url {
                config.base_url = Url::parse(base_url).context("invalid --base-url")?;
            }
            config
        }
        (None, Some(base_url)) => {
            TaskerConfig::new(Url::parse(base_url).context("invalid --base-url")?)
        }
        (None, None) => bail!("either --config or --base-url is required"),
    };
    config.validated().context("invalid configuration")
}

fn from_file(path: &Path) -> Result<TaskerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let config: TaskerConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(config)
}

/// Parse `Name: value` header flags
pub fn parse_headers(raw: &[String]) -> Result<Option<HeaderMap>> {
    if raw.is_empty() {
        return Ok(None);
    }

    let mut headers = HeaderMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once(':')
            .ok_or_else(|| anyhow!("header must look like 'Name: value', got {entry:?}"))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("invalid header name in {entry:?}"))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("invalid header value in {entry:?}"))?;
        headers.append(name, value);
    }
    Ok(Some(headers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_base_url_only() {
        let config = assert_ok!(load_config(None, Some("http://localhost:8000")));
        assert_eq!(config.dispose_path, "/dispose");
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/");
    }

    #[test]
    fn test_requires_some_source() {
        assert_err!(load_config(None, None));
        assert_err!(load_config(None, Some("ftp://localhost")));
    }

    #[test]
    fn test_file_with_base_url_override() {
        let path = std::env::temp_dir().join(format!("tasker-cli-{}.yaml", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("create temp config");
        writeln!(
            file,
            "base_url: \"http://from-file:1\"\nterminate_path: \"/cancel\"\nevents:\n  progress: \"tick\""
        )
        .expect("write temp config");

        let config = load_config(Some(&path), Some("http://override:2")).expect("config");
        std::fs::remove_file(&path).ok();

        assert_eq!(config.base_url.as_str(), "http://override:2/");
        assert_eq!(config.terminate_path, "/cancel");
        assert_eq!(config.events.progress, "tick");
        assert_eq!(config.events.success, "success");
    }

    #[test]
    fn test_parse_headers() {
        let headers = parse_headers(&[
            "Authorization: Bearer abc".to_string(),
            "X-Trace:42".to_string(),
        ])
        .expect("headers")
        .expect("some headers");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert_eq!(headers.get("x-trace").unwrap(), "42");
    }

    #[test]
    fn test_parse_headers_rejects_missing_colon() {
        assert_err!(parse_headers(&["Authorization Bearer".to_string()]));
        assert!(assert_ok!(parse_headers(&[])).is_none());
    }
}
