use filawatch_config::load_toml;
use rstest::rstest;

const FULL_CONFIG: &str = r#"
[transport]
simulated = true
read_timeout_ms = 50
bcm_pins = [17, 27, 22, 23]

[poll]
base_interval_ms = 10

[e0]
enabled = true
runout_pin = 0
runout_inverted = false
motion_pin = 1
motion_inverted = true
motion_timeout_ms = 30000
debounce_ms = 500

[e1]
enabled = true
runout_pin = 2
motion_pin = 3
motion_timeout_ms = 45000
debounce_ms = 250

[monitor]
only_active_extruder = true
notification_enabled = false

[actions]
runout_script = "M600\n; note\nM117 Insert filament"
motion_timeout_script = "@pause"

[logging]
file = "filawatch.log"
level = "debug"
rotation = "daily"
"#;

#[test]
fn full_config_parses_and_validates() {
    let cfg = load_toml(FULL_CONFIG).expect("parse TOML");
    cfg.validate().expect("valid config");
    assert!(cfg.transport.simulated);
    assert!(cfg.e0.motion_inverted);
    assert_eq!(cfg.e1.motion_timeout_ms, 45_000);
    assert_eq!(cfg.e1.debounce_ms, 250);
    assert!(!cfg.monitor.notification_enabled);
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[test]
fn partial_sections_fall_back_to_per_field_defaults() {
    let cfg = load_toml("[e0]\nenabled = false\n").expect("parse TOML");
    assert!(!cfg.e0.enabled);
    assert_eq!(cfg.e0.debounce_ms, 500);
    assert_eq!(cfg.e1.runout_pin, 2, "untouched e1 keeps its defaults");
    cfg.validate().expect("valid config");
}

#[test]
fn default_action_scripts_match_the_shipped_behavior() {
    let cfg = load_toml("").expect("parse TOML");
    assert!(cfg.actions.runout_script.starts_with("M600"));
    assert!(cfg.actions.motion_timeout_script.starts_with("@pause"));
}

#[test]
fn rejects_zero_poll_interval() {
    let cfg = load_toml("[poll]\nbase_interval_ms = 0\n").expect("parse TOML");
    let err = cfg.validate().expect_err("zero interval must be rejected");
    assert!(format!("{err}").contains("base_interval_ms must be > 0"));
}

#[test]
fn rejects_zero_read_timeout() {
    let cfg = load_toml("[transport]\nread_timeout_ms = 0\n").expect("parse TOML");
    let err = cfg.validate().expect_err("zero timeout must be rejected");
    assert!(format!("{err}").contains("read_timeout_ms must be > 0"));
}

#[rstest]
#[case("[e0]\nrunout_pin = 4\n", "0..=3")]
#[case("[e0]\nmotion_pin = 200\n", "0..=3")]
#[case("[e1]\nrunout_pin = 0\n", "more than one")]
#[case("[e0]\nmotion_timeout_ms = 0\n", "motion_timeout_ms must be > 0")]
fn rejects_bad_sensor_wiring(#[case] toml: &str, #[case] expected: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("invalid wiring must be rejected");
    assert!(
        format!("{err}").contains(expected),
        "error {err} missing {expected:?}"
    );
}

#[test]
fn disabled_extruders_may_share_pins() {
    let cfg = load_toml("[e1]\nenabled = false\nrunout_pin = 0\n").expect("parse TOML");
    cfg.validate()
        .expect("pins of disabled extruders are not checked");
}

#[test]
fn garbage_toml_is_a_parse_error() {
    assert!(load_toml("not = [valid").is_err());
}
