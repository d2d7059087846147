use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like \
  Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 \
  Mobile/15E148 Safari/604.1";

/// How to address the extraction engine: which client to impersonate,
/// with which headers and retry/timeout knobs.
///
/// Built once (from defaults or a strategies file) and only ever read
/// afterwards. The download step reuses the winning value as-is and passes
/// its format selector separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
  pub name: String,
  pub player_client: Vec<String>,
  pub user_agent: Option<String>,
  pub headers: BTreeMap<String, String>,
  pub extractor_retries: u32,
  pub fragment_retries: u32,
  pub socket_timeout_secs: u64,
  /// Upper bound for one probe process, retries included.
  pub probe_timeout_secs: u64,
  pub skip: Vec<String>,
  pub player_skip: Vec<String>,
  pub no_check_certificate: bool,
  pub prefer_insecure: bool,
  pub proxy: Option<String>,
}

impl Default for StrategyConfig {
  fn default() -> Self {
    Self {
      name: String::from("default"),
      player_client: vec![],
      user_agent: None,
      headers: BTreeMap::new(),
      extractor_retries: 3,
      fragment_retries: 3,
      socket_timeout_secs: 30,
      probe_timeout_secs: 120,
      skip: vec![],
      player_skip: vec![],
      no_check_certificate: false,
      prefer_insecure: false,
      proxy: None,
    }
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

impl StrategyConfig {
  pub fn named(name: &str) -> Self {
    Self {
      name: name.to_string(),
      ..Default::default()
    }
  }

  /// Fill in a process-wide proxy unless the strategy names its own.
  pub fn with_default_proxy(self, proxy: Option<&str>) -> Self {
    Self {
      proxy: self.proxy.or_else(|| proxy.map(String::from)),
      ..self
    }
  }

  fn extractor_args(&self) -> Option<String> {
    let mut parts = Vec::new();
    if !self.player_client.is_empty() {
      parts.push(format!("player_client={}", self.player_client.join(",")));
    }
    if !self.skip.is_empty() {
      parts.push(format!("skip={}", self.skip.join(",")));
    }
    if !self.player_skip.is_empty() {
      parts.push(format!("player_skip={}", self.player_skip.join(",")));
    }

    (!parts.is_empty()).then(|| format!("youtube:{}", parts.join(";")))
  }

  /// yt-dlp command line arguments shared by probing and downloading.
  pub fn args(&self) -> Vec<String> {
    let mut args = vec![
      "--extractor-retries".to_string(),
      self.extractor_retries.to_string(),
      "--fragment-retries".to_string(),
      self.fragment_retries.to_string(),
      "--socket-timeout".to_string(),
      self.socket_timeout_secs.to_string(),
      "--no-cache-dir".to_string(),
    ];

    if self.no_check_certificate {
      args.push("--no-check-certificates".into());
    }
    if self.prefer_insecure {
      args.push("--prefer-insecure".into());
    }
    if let Some(user_agent) = &self.user_agent {
      args.push("--user-agent".into());
      args.push(user_agent.clone());
    }
    for (name, value) in &self.headers {
      args.push("--add-header".into());
      args.push(format!("{name}:{value}"));
    }
    if let Some(proxy) = &self.proxy {
      args.push("--proxy".into());
      args.push(proxy.clone());
    }
    if let Some(extractor_args) = self.extractor_args() {
      args.push("--extractor-args".into());
      args.push(extractor_args);
    }

    args
  }
}

/// Built-in fallback sequence, cheapest and least suspicious client first.
pub fn default_strategies() -> Vec<StrategyConfig> {
  vec![
    StrategyConfig {
      player_client: strings(&["web"]),
      skip: strings(&["hls", "dash", "webpage"]),
      player_skip: strings(&["js", "configs", "webpage"]),
      extractor_retries: 1,
      fragment_retries: 1,
      no_check_certificate: true,
      prefer_insecure: true,
      ..StrategyConfig::named("web-minimal")
    },
    StrategyConfig {
      player_client: strings(&["android"]),
      player_skip: strings(&["webpage"]),
      extractor_retries: 2,
      ..StrategyConfig::named("android")
    },
    StrategyConfig {
      player_client: strings(&["ios"]),
      user_agent: Some(MOBILE_USER_AGENT.into()),
      extractor_retries: 2,
      ..StrategyConfig::named("ios")
    },
    StrategyConfig {
      player_client: strings(&["tv"]),
      extractor_retries: 2,
      ..StrategyConfig::named("tv")
    },
    StrategyConfig {
      player_client: strings(&["mweb"]),
      user_agent: Some(MOBILE_USER_AGENT.into()),
      ..StrategyConfig::named("mweb")
    },
    StrategyConfig {
      user_agent: Some(DESKTOP_USER_AGENT.into()),
      headers: BTreeMap::from([(
        "Accept-Language".to_string(),
        "en-US,en;q=0.9".to_string(),
      )]),
      extractor_retries: 5,
      ..StrategyConfig::named("web-full")
    },
  ]
}

/// Read a JSON array of strategies. Omitted fields take their defaults.
pub fn load_strategies(path: &Path) -> anyhow::Result<Vec<StrategyConfig>> {
  use anyhow::Context;

  let contents = std::fs::read_to_string(path)
    .with_context(|| format!("reading strategies from {}", path.display()))?;
  let strategies: Vec<StrategyConfig> = serde_json::from_str(&contents)
    .with_context(|| format!("parsing strategies in {}", path.display()))?;

  anyhow::ensure!(
    !strategies.is_empty(),
    "{} contains no strategies",
    path.display()
  );
  Ok(strategies)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_minimal_strategy_args() {
    let strategy = &default_strategies()[0];
    let args = strategy.args();

    assert!(args.contains(&"--no-check-certificates".to_string()));
    assert!(args.contains(&"--prefer-insecure".to_string()));
    let pos = args.iter().position(|a| a == "--extractor-args").unwrap();
    assert_eq!(
      args[pos + 1],
      "youtube:player_client=web;skip=hls,dash,webpage;\
       player_skip=js,configs,webpage"
    );
    let pos = args.iter().position(|a| a == "--extractor-retries").unwrap();
    assert_eq!(args[pos + 1], "1");
  }

  #[test]
  fn test_plain_strategy_has_no_extractor_args() {
    let args = StrategyConfig::named("plain").args();
    assert!(!args.contains(&"--extractor-args".to_string()));
    assert!(!args.contains(&"--proxy".to_string()));
  }

  #[test]
  fn test_default_proxy() {
    let strategy =
      StrategyConfig::named("a").with_default_proxy(Some("socks5://h:1"));
    assert_eq!(strategy.proxy.as_deref(), Some("socks5://h:1"));

    let own = StrategyConfig {
      proxy: Some("http://own:8080".into()),
      ..StrategyConfig::named("b")
    };
    let own = own.with_default_proxy(Some("socks5://h:1"));
    assert_eq!(own.proxy.as_deref(), Some("http://own:8080"));
  }

  #[test]
  fn test_default_names_are_unique() {
    let strategies = default_strategies();
    let mut names: Vec<_> = strategies.iter().map(|s| &s.name).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), strategies.len());
  }

  #[test]
  fn test_load_strategies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("strategies.json");
    std::fs::write(
      &path,
      r#"[{"name": "tv", "player_client": ["tv"]}, {"name": "plain"}]"#,
    )
    .unwrap();

    let strategies = load_strategies(&path).unwrap();
    assert_eq!(strategies.len(), 2);
    assert_eq!(strategies[0].player_client, vec!["tv".to_string()]);
    assert_eq!(strategies[1].socket_timeout_secs, 30);

    std::fs::write(&path, "[]").unwrap();
    assert!(load_strategies(&path).is_err());
  }
}
