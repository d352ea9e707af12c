use repscore_core::Database;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("repscore/reputation.db")
    }

    fn write_config(&self, content: &str) {
        let dir = self.xdg_config.join("repscore");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), content).expect("failed to write config");
    }
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../repscore-core/tests/fixtures/events.json")
}

fn run_bin(env: &CliTestEnv, args: &[&str]) -> Output {
    Command::new(assert_cmd::cargo::cargo_bin!("repscore"))
        .args(args)
        .env("HOME", &env.home)
        .env("XDG_DATA_HOME", &env.xdg_data)
        .env("XDG_CONFIG_HOME", &env.xdg_config)
        .env("XDG_STATE_HOME", &env.xdg_state)
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("failed to execute repscore: {e}"))
}

fn assert_success(args: &[&str], output: &Output) {
    assert!(
        output.status.success(),
        "repscore {:?} failed\nstatus: {:?}\nstdout:\n{}\nstderr:\n{}",
        args,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

fn run_ok(env: &CliTestEnv, args: &[&str]) -> String {
    let output = run_bin(env, args);
    assert_success(args, &output);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn run_json(env: &CliTestEnv, args: &[&str]) -> serde_json::Value {
    let mut full = vec!["--format", "json"];
    full.extend_from_slice(args);
    let stdout = run_ok(env, &full);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("invalid JSON from {args:?}: {e}\n{stdout}"))
}

fn import_fixture(env: &CliTestEnv) {
    let fixture = fixture_path();
    let fixture = fixture.to_str().expect("fixture path is not UTF-8");
    let stdout = run_ok(env, &["import", "--file", fixture]);
    assert!(stdout.contains("Imported 17 rows"), "unexpected output:\n{stdout}");
    assert!(stdout.contains("fingerprint:"));
}

#[test]
fn test_import_populates_database_and_logs() {
    let env = CliTestEnv::new();
    import_fixture(&env);

    let db = Database::open(&env.db_path()).expect("failed to open CLI database");
    let counts = db.derived_counts().expect("failed to count derived rows");
    assert_eq!(counts.daily_stats, 8);
    assert_eq!(counts.trust_scores, 3);
    assert_eq!(counts.industry_benchmarks, 2);

    let log_dir = env.xdg_state.join("repscore");
    let has_log = fs::read_dir(&log_dir)
        .expect("log dir missing")
        .filter_map(|e| e.ok())
        .any(|e| e.file_name().to_string_lossy().starts_with("repscore"));
    assert!(has_log, "no log file in {}", log_dir.display());
}

#[test]
fn test_recompute_reports_stable_fingerprint() {
    let env = CliTestEnv::new();
    import_fixture(&env);

    let first = run_json(&env, &["recompute"]);
    let second = run_json(&env, &["recompute"]);
    assert_eq!(first["fingerprint"], second["fingerprint"]);
    assert_eq!(first["trust_score_rows"], 3);

    let stages: Vec<&str> = first["stages"]
        .as_array()
        .expect("stages should be an array")
        .iter()
        .filter_map(|s| s["stage"].as_str())
        .collect();
    assert_eq!(
        stages,
        vec!["load", "validate", "daily_stats", "trust_score", "industry_benchmark", "swap"]
    );

    let runs = run_json(&env, &["runs"]);
    assert_eq!(runs.as_array().map(Vec::len), Some(3));
}

#[test]
fn test_query_commands_return_json() {
    let env = CliTestEnv::new();
    import_fixture(&env);

    let businesses = run_json(&env, &["businesses"]);
    assert_eq!(businesses.as_array().map(Vec::len), Some(4));

    let overview = run_json(&env, &["overview", "1"]);
    assert_eq!(overview["name"], "Mama Put Kitchen");
    assert_eq!(overview["total_reviews"], 4);
    assert!(overview["trust_score"].as_f64().is_some());

    let trend = run_json(&env, &["trend", "1"]);
    assert_eq!(trend.as_array().map(Vec::len), Some(3));

    let monthly = run_json(&env, &["rating-trend", "1"]);
    assert_eq!(monthly[0]["month"], "2025-06-01");

    let benchmark = run_json(&env, &["benchmark", "2"]);
    assert_eq!(benchmark["industry"], "Restaurant");

    let sentiment = run_json(&env, &["sentiment", "1", "--days", "100000"]);
    assert_eq!(sentiment["Positive"], 3);
    assert_eq!(sentiment["Neutral"], 0);
    assert_eq!(sentiment["Negative"], 1);

    let deltas = run_json(&env, &["deltas", "1"]);
    assert!(deltas["delta_rating"].as_f64().is_some());

    let geo = run_json(&env, &["geo"]);
    assert_eq!(geo.as_array().map(Vec::len), Some(3));

    let insight = run_json(&env, &["geo-insight"]);
    assert!(insight["insight"].as_str().is_some());
}

#[test]
fn test_unknown_business_exits_not_found() {
    let env = CliTestEnv::new();
    import_fixture(&env);

    let output = run_bin(&env, &["overview", "999999"]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "unexpected stderr:\n{stderr}");

    // No reviewed business in Hospitality, so no benchmark row
    let output = run_bin(&env, &["benchmark", "4"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_empty_database_queries() {
    let env = CliTestEnv::new();

    let stdout = run_ok(&env, &["businesses"]);
    assert!(stdout.contains("No businesses found."));

    let insight = run_json(&env, &["geo-insight"]);
    assert_eq!(insight["verdict"], "insufficient_data");
    assert_eq!(insight["insight"], "Not enough data for insights.");
}

#[test]
fn test_invalid_config_is_rejected() {
    let env = CliTestEnv::new();
    env.write_config(
        r#"
[scoring.weights]
rating = 0.9
response = 0.3
volume = 0.2
"#,
    );

    let output = run_bin(&env, &["businesses"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("configuration"));
}

#[test]
fn test_invalid_events_abort_without_swapping() {
    let env = CliTestEnv::new();
    import_fixture(&env);
    let before = run_json(&env, &["overview", "1"]);

    let bad = env.home.join("bad.json");
    fs::write(
        &bad,
        r#"{"reviews": [{"id": 50, "business_id": 1, "rating": 7, "sentiment_score": 0.1,
            "created_at": "2025-07-20T10:00:00Z"}]}"#,
    )
    .expect("failed to write events");

    let output = run_bin(&env, &["import", "--file", bad.to_str().expect("utf-8 path")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("validate"));

    let after = run_json(&env, &["overview", "1"]);
    assert_eq!(before, after);
}
