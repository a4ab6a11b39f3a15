use super::*;
use std::fs;

fn parse(toml_str: &str) -> Config {
    toml::from_str(toml_str).unwrap()
}

#[test]
fn test_defaults_when_empty() {
    let config = parse("");
    assert_eq!(config, Config::default());
    assert!(config.auto_continue());
    assert_eq!(config.max_turns(), crate::constants::MAX_AGENT_TURNS);
    assert!(config.bash_enabled());
    assert_eq!(
        config.bash_timeout_secs(),
        crate::constants::BASH_DEFAULT_TIMEOUT_SECS
    );
    assert_eq!(config.system_prompt(), crate::constants::DEFAULT_SYSTEM_PROMPT);
}

#[test]
fn test_sections_parse() {
    let config = parse(
        r#"
model = "gemini/gemini-2.5-pro"
default_provider = "gemini"

[provider.gemini]
base_url = "http://localhost:9999"

[agent]
auto_continue = false
max_turns = 0

[tools]
bash = false
bash_timeout_secs = 5
"#,
    );
    assert_eq!(config.provider_name(), Some("gemini"));
    assert_eq!(config.model_name().as_deref(), Some("gemini-2.5-pro"));
    assert_eq!(config.base_url("gemini"), Some("http://localhost:9999"));
    assert_eq!(config.base_url("anthropic"), None);
    assert!(!config.auto_continue());
    assert_eq!(config.max_turns(), 1);
    assert!(!config.bash_enabled());
    assert_eq!(config.bash_timeout_secs(), 5);
}

#[test]
fn test_default_model_is_not_configured() {
    assert_eq!(Config::default().model_name(), None);
}

#[test]
fn test_load_or_create_writes_default_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(
        config.provider.anthropic.unwrap().api_key.as_deref(),
        Some("{env:ANTHROPIC_API_KEY}")
    );

    // Second load reads the file back.
    let again = Config::load_or_create(&path).unwrap();
    assert_eq!(again.tools.bash, Some(true));
}

#[test]
fn test_load_or_create_reports_parse_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "model = [").unwrap();
    let err = Config::load_or_create(&path).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to parse config"));
}

#[test]
fn test_find_project_walks_up_to_git_root() {
    let root = tempfile::tempdir().unwrap();
    fs::create_dir(root.path().join(".git")).unwrap();
    fs::write(
        root.path().join("toolstream.toml"),
        "default_provider = \"gemini\"\n",
    )
    .unwrap();
    let nested = root.path().join("a").join("b");
    fs::create_dir_all(&nested).unwrap();

    let found = Config::find_project(&nested).unwrap().unwrap();
    assert_eq!(found.provider_name(), Some("gemini"));
}

#[test]
fn test_find_project_stops_at_git_root() {
    let outer = tempfile::tempdir().unwrap();
    fs::write(
        outer.path().join("toolstream.toml"),
        "default_provider = \"gemini\"\n",
    )
    .unwrap();
    let repo = outer.path().join("repo");
    fs::create_dir_all(repo.join(".git")).unwrap();

    assert!(Config::find_project(&repo).unwrap().is_none());
}

#[test]
fn test_merge_project_wins_per_field() {
    let global = parse(
        r#"
[provider.anthropic]
api_key = "global-key"
base_url = "https://global.test"

[agent]
max_turns = 4
"#,
    );
    let project = parse(
        r#"
model = "claude-opus-4"

[provider.anthropic]
base_url = "https://project.test"

[agent]
auto_continue = false
"#,
    );

    let merged = Config::merge(global, project);
    assert_eq!(merged.model, "claude-opus-4");
    let anthropic = merged.provider.anthropic.unwrap();
    assert_eq!(anthropic.api_key.as_deref(), Some("global-key"));
    assert_eq!(anthropic.base_url.as_deref(), Some("https://project.test"));
    assert_eq!(merged.agent.max_turns, Some(4));
    assert_eq!(merged.agent.auto_continue, Some(false));
}

#[test]
fn test_env_substitution() {
    std::env::set_var("TOOLSTREAM_TEST_SUBST", "sk-123");
    std::env::remove_var("TOOLSTREAM_TEST_UNSET");
    assert_eq!(
        Config::resolve_str("key={env:TOOLSTREAM_TEST_SUBST};x={env:TOOLSTREAM_TEST_UNSET}"),
        "key=sk-123;x="
    );
    assert_eq!(Config::resolve_str("{env:unterminated"), "{env:unterminated");
}

#[test]
fn test_api_key_falls_back_to_config() {
    std::env::remove_var("GEMINI_API_KEY");
    let config = parse("[provider.gemini]\napi_key = \"from-config\"\n");
    assert_eq!(config.resolve_api_key("gemini").as_deref(), Some("from-config"));
    assert_eq!(parse("").resolve_api_key("gemini"), None);
}
