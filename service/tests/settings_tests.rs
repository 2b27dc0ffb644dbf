use secure_scaffold::{
    config::NonceMode,
    csp::CspPolicy,
    settings::{DefaultSettings, ReportTo, Settings, SettingsError},
};
use serde_json::{json, Map, Value};

fn defaults() -> Map<String, Value> {
    DefaultSettings::new()
        .into_namespace()
        .expect("default settings")
}

fn user(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[test]
fn defaults_only_names_return_defaults() {
    let settings = Settings::new(user(json!({"unrelated": true})), defaults());
    assert_eq!(
        settings.get_as::<Vec<String>>("non_xsrf_protected_methods").expect("methods"),
        vec!["options", "head", "get"]
    );
    assert_eq!(settings.get_as::<u64>("xsrf_time_limit").expect("limit"), 86_400);
}

#[test]
fn user_values_take_precedence() {
    let settings = Settings::new(
        user(json!({"xsrf_time_limit": 3600, "xsrf_exempt_paths": []})),
        defaults(),
    );
    assert_eq!(settings.get_as::<u64>("xsrf_time_limit").expect("limit"), 3600);
    assert!(settings
        .get_as::<Vec<String>>("xsrf_exempt_paths")
        .expect("paths")
        .is_empty());
}

#[test]
fn null_user_value_is_treated_as_unset() {
    let settings = Settings::new(user(json!({"secret_key": null})), defaults());
    let key = settings.get_as::<String>("secret_key").expect("key");
    assert!(!key.is_empty());
}

#[test]
fn unknown_setting_fails_with_lookup_error() {
    let settings = Settings::new(None, defaults());
    let err = settings.get("cloud_tasks_body").expect_err("should be missing");
    assert!(matches!(err, SettingsError::Missing { .. }));
    assert_eq!(
        err.to_string(),
        "Setting \"cloud_tasks_body\" does not exist, please define it."
    );
}

#[test]
fn missing_csp_setting_fails_policy_build() {
    let mut defaults = defaults();
    defaults.remove("csp_config");
    let settings = Settings::new(None, defaults);
    assert!(CspPolicy::from_settings(&settings, NonceMode::PerRequest).is_err());
}

#[test]
fn report_to_override_is_rendered() {
    let settings = Settings::new(
        user(json!({"report_to_header": {
            "group": "violations",
            "max_age": 60,
            "endpoints": ["https://reports.example.com/csp"]
        }})),
        defaults(),
    );
    let policy = CspPolicy::from_settings(&settings, NonceMode::PerRequest).expect("policy");
    let value: Value = serde_json::from_str(policy.report_to_value().to_str().expect("ascii"))
        .expect("json");
    assert_eq!(value["group"], "violations");
    assert_eq!(value["max_age"], 60);
    assert_eq!(value["endpoints"][0]["url"], "https://reports.example.com/csp");
}

#[test]
fn report_to_accepts_hyphenated_max_age() {
    let settings = Settings::new(
        user(json!({"report_to_header": {
            "group": "csp-endpoint",
            "max-age": 120,
            "endpoints": ["/csp/"]
        }})),
        defaults(),
    );
    let report_to: ReportTo = settings.get_as("report_to_header").expect("report_to");
    assert_eq!(report_to.max_age, 120);

    let policy = CspPolicy::from_settings(&settings, NonceMode::PerRequest).expect("policy");
    let value: Value = serde_json::from_str(policy.report_to_value().to_str().expect("ascii"))
        .expect("json");
    assert_eq!(value["max_age"], 120);
}
