use pagepulse::domain::ScheduleSpec;
use pagepulse::interfaces::config::Config;

fn parse(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn interval_and_cron_are_mutually_exclusive() {
    let cfg = parse(
        r#"
targets:
  - url: https://example.com/a
    interval_minutes: 5
    cron: "0 8 * * *"
"#,
    );
    assert!(cfg.to_monitor_targets().is_err());
}

#[test]
fn a_target_needs_some_schedule() {
    let cfg = parse(
        r#"
targets:
  - url: https://example.com/a
"#,
    );
    assert!(cfg.to_monitor_targets().is_err());
}

#[test]
fn id_is_derived_from_the_url_when_absent() {
    let cfg = parse(
        r#"
targets:
  - url: https://example.com/news?page=1
    interval_minutes: 5
"#,
    );
    let targets = cfg.to_monitor_targets().unwrap();
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id, "example.com_news_page_1");
    assert_eq!(targets[0].schedule, ScheduleSpec::Interval { minutes: 5 });
    assert!(targets[0].active);
    assert_eq!(targets[0].threshold, 50);
}

#[test]
fn degenerate_region_is_dropped_at_the_write_boundary() {
    let cfg = parse(
        r#"
targets:
  - id: a
    url: https://example.com/a
    interval_minutes: 5
    region: { left: 10, top: 0, right: 5, bottom: 20 }
  - id: b
    url: https://example.com/b
    interval_minutes: 5
    region: { left: 0, top: 0, right: 100, bottom: 80 }
"#,
    );
    let targets = cfg.to_monitor_targets().unwrap();
    assert!(targets[0].region.is_none());
    let region = targets[1].region.unwrap();
    assert_eq!((region.width(), region.height()), (100, 80));
}

#[test]
fn auth_descriptor_round_trips_through_yaml() {
    let cfg = parse(
        r##"
targets:
  - id: a
    url: https://example.com/a
    interval_minutes: 5
    auth:
      kind: credentials
      username: operator
      password: secret
      username_selector: "#user"
      password_selector: "#pass"
      submit_selector: "#submit"
"##,
    );
    let targets = cfg.to_monitor_targets().unwrap();
    assert!(targets[0].auth.is_complete());
}
