mod common;

use chrono::{Duration, TimeZone, Utc};
use common::{request, t0, target};
use pretty_assertions::assert_eq;
use warden_license::{
    Beta, ConstraintCaps, ConstraintKind, ConstraintNode, DateRange, DomainList, ExecutionMode,
    FunctionGate, TimeRange, TimeWindow, UsageLimit, UsageMode, ValidationContext, ValidationLog,
    ValidationRequest, VersionRange,
};
use warden_types::{FixedClock, ScopeId, Version};

fn run(node: &mut ConstraintNode, request: &ValidationRequest, clock: &FixedClock) -> (bool, ValidationLog, ConstraintCaps) {
    let ctx = ValidationContext::new(request, clock).with_first_use(Some(t0()));
    let mut log = ValidationLog::default();
    let mut caps = ConstraintCaps::unconstrained();
    let ok = node.validate(&ctx, &mut log, &mut caps);
    (ok, log, caps)
}

fn leaf(kind: ConstraintKind) -> ConstraintNode {
    ConstraintNode::new(kind)
}

#[test]
fn or_with_expired_beta_and_fresh_trial_passes_and_clears_failure() {
    let clock = FixedClock::new(t0());
    let mut node = ConstraintNode::or(vec![
        leaf(ConstraintKind::Beta(Beta::until(t0() - Duration::days(1)))),
        leaf(ConstraintKind::DateRange(DateRange::days_from_first_use(10))),
    ]);
    let (ok, log, _) = run(&mut node, &request(), &clock);
    assert!(ok);
    assert_eq!(log.failure_reason, "");
}

#[test]
fn or_keeps_failure_text_recorded_before_it() {
    let clock = FixedClock::new(t0());
    let req = request();
    let ctx = ValidationContext::new(&req, &clock);
    let mut log = ValidationLog {
        failure_reason: "earlier".to_string(),
        warnings: Vec::new(),
    };
    let mut caps = ConstraintCaps::unconstrained();
    let mut node = ConstraintNode::or(vec![
        leaf(ConstraintKind::FunctionGate(FunctionGate::denied(""))),
        leaf(ConstraintKind::FunctionGate(FunctionGate::default())),
    ]);
    assert!(node.validate(&ctx, &mut log, &mut caps));
    assert_eq!(log.failure_reason, "earlier");
}

#[test]
fn and_fails_when_any_child_fails() {
    let clock = FixedClock::new(t0());
    let mut node = ConstraintNode::and(vec![
        leaf(ConstraintKind::FunctionGate(FunctionGate::default())),
        leaf(ConstraintKind::Beta(Beta::until(t0() - Duration::days(1)))).named("beta"),
    ]);
    let (ok, log, _) = run(&mut node, &request(), &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("The beta period has expired."));
    assert!(log.failure_reason.contains("See previous descriptions"));
    assert!(log.failure_reason.contains("Name: beta"));
}

#[test]
fn and_evaluates_every_child() {
    let clock = FixedClock::new(t0());
    let mut node = ConstraintNode::and(vec![
        leaf(ConstraintKind::FunctionGate(FunctionGate::denied(""))),
        leaf(ConstraintKind::Usage(UsageLimit::new(10, -1, -1))),
    ]);
    let (ok, _, _) = run(&mut node, &request(), &clock);
    assert!(!ok);

    let ConstraintKind::And(group) = &node.kind else {
        panic!("expected an and node");
    };
    let ConstraintKind::Usage(usage) = &group.items[1].kind else {
        panic!("expected a usage node");
    };
    assert_eq!(usage.current_usage, 1);
}

#[test]
fn usage_limit_of_three_grants_three_times() {
    let clock = FixedClock::new(t0());
    let req = request();
    let mut node = leaf(ConstraintKind::Usage(UsageLimit::new(3, -1, -1)));
    let outcomes: Vec<bool> = (0..4).map(|_| run(&mut node, &req, &clock).0).collect();
    assert_eq!(outcomes, vec![true, true, true, false]);

    let (_, log, _) = run(&mut node, &req, &clock);
    assert!(log.failure_reason.contains("The maximum number of uses has been reached."));
}

#[test]
fn usage_counts_days_once_per_date() {
    let clock = FixedClock::new(t0());
    let req = request();
    let mut node = leaf(ConstraintKind::Usage(UsageLimit::new(-1, -1, 2)));

    assert!(run(&mut node, &req, &clock).0);
    assert!(run(&mut node, &req, &clock).0);
    clock.advance(Duration::days(1));
    assert!(run(&mut node, &req, &clock).0);
    clock.advance(Duration::days(1));
    let (ok, log, _) = run(&mut node, &req, &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("The maximum number of days has been reached."));
}

#[test]
fn hit_limit_is_checked_after_usage() {
    let clock = FixedClock::new(t0());
    let req = request();
    let mut node = leaf(ConstraintKind::Usage(UsageLimit::new(-1, 1, -1)));
    assert!(run(&mut node, &req, &clock).0);
    let (ok, log, _) = run(&mut node, &req, &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("The maximum number of hits has been reached."));
}

#[test]
fn time_window_uses_military_time() {
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());
    let req = request();
    let mut office = leaf(ConstraintKind::TimeWindow(TimeWindow::new(vec![TimeRange::new(900, 1700)])));
    assert!(run(&mut office, &req, &clock).0);

    clock.set(Utc.with_ymd_and_hms(2026, 3, 1, 17, 1, 0).unwrap());
    let (ok, log, _) = run(&mut office, &req, &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("(1701)"));
}

#[test]
fn date_range_reports_inactive_and_expired() {
    let clock = FixedClock::new(t0());
    let req = request();

    let mut future = leaf(ConstraintKind::DateRange(DateRange {
        info_url: "https://acme.test/info".to_string(),
        ..DateRange::between(Some(t0() + Duration::days(2)), None)
    }));
    let (ok, log, _) = run(&mut future, &req, &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("has not been activated yet"));
    assert!(log.failure_reason.contains("2026-03-03"));
    assert!(log.failure_reason.contains("https://acme.test/info"));

    let mut past = leaf(ConstraintKind::DateRange(DateRange {
        purchase_url: "https://acme.test/buy".to_string(),
        ..DateRange::between(None, Some(t0() - Duration::hours(1)))
    }));
    let (ok, log, _) = run(&mut past, &req, &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("The license has expired."));
    assert!(log.failure_reason.contains("https://acme.test/buy"));
}

#[test]
fn trial_expires_after_duration_from_first_use() {
    let clock = FixedClock::new(t0() + Duration::days(10));
    let req = request();
    let mut trial = leaf(ConstraintKind::DateRange(DateRange::days_from_first_use(10)));
    assert!(run(&mut trial, &req, &clock).0);

    clock.advance(Duration::minutes(1));
    assert!(!run(&mut trial, &req, &clock).0);
}

#[test]
fn beta_without_end_date_fails() {
    let clock = FixedClock::new(t0());
    let mut beta = leaf(ConstraintKind::Beta(Beta {
        end: None,
        update_url: "https://acme.test/update".to_string(),
    }));
    let (ok, log, _) = run(&mut beta, &request(), &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("You may get an update at: https://acme.test/update"));
}

#[test]
fn domain_matching_is_normalized() {
    let clock = FixedClock::new(t0());
    let mut node = leaf(ConstraintKind::Domain(DomainList::new(["Shop.Example.com"])));

    let req = request().with_domain("https://shop.example.com/");
    assert!(run(&mut node, &req, &clock).0);

    let req = request().with_domain("evil.example.com");
    assert!(!run(&mut node, &req, &clock).0);

    assert!(!run(&mut node, &request(), &clock).0);
}

#[test]
fn deserialized_domain_lists_are_normalized() {
    let json = r#"{"type": "domain", "domains": ["HTTPS://Shop.Example.com/", "acme.test"]}"#;
    let mut node: ConstraintNode = serde_json::from_str(json).unwrap();
    let ConstraintKind::Domain(list) = &node.kind else {
        panic!("expected a domain node, got {:?}", node.kind);
    };
    assert_eq!(list.domains, vec!["shop.example.com".to_string(), "acme.test".to_string()]);

    let clock = FixedClock::new(t0());
    let req = request().with_domain("shop.example.com");
    assert!(run(&mut node, &req, &clock).0);
}

#[test]
fn version_range_is_exclusive() {
    let clock = FixedClock::new(t0());
    let req = request();
    let range = |min: &str, max: &str| {
        leaf(ConstraintKind::VersionRange(VersionRange::new(
            Version::parse(min).unwrap(),
            Version::parse(max).unwrap(),
        )))
    };

    assert!(run(&mut range("1.0", "2.0"), &req, &clock).0);
    assert!(!run(&mut range("1.5", "2.0"), &req, &clock).0);
    assert!(!run(&mut range("1.0", "1.5.0"), &req, &clock).0);
    assert!(run(&mut range("", ""), &req, &clock).0);
}

#[test]
fn execution_mode_must_match() {
    let clock = FixedClock::new(t0());
    let mut design_only = leaf(ConstraintKind::ExecutionMode(ExecutionMode::requiring(UsageMode::Design)));

    let (ok, log, _) = run(&mut design_only, &request(), &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("design-time environment"));

    let design = ValidationRequest::new(target(), UsageMode::Design);
    assert!(run(&mut design_only, &design, &clock).0);
}

#[test]
fn function_gate_names_the_function() {
    let clock = FixedClock::new(t0());
    let mut gate = leaf(ConstraintKind::FunctionGate(FunctionGate::denied("https://acme.test/pro"))).named("Export");
    let (ok, log, _) = run(&mut gate, &request(), &clock);
    assert!(!ok);
    assert!(log.failure_reason.contains("The function Export is not allowed"));
    assert!(log.failure_reason.contains("https://acme.test/pro"));
}

#[test]
fn out_of_scope_nodes_are_skipped() {
    let clock = FixedClock::new(t0());
    let mut node = leaf(ConstraintKind::FunctionGate(FunctionGate::default()))
        .scoped(ScopeId::new())
        .with_caps(5, 8)
        .with_warning("never shown");
    let (ok, log, caps) = run(&mut node, &request(), &clock);
    assert!(!ok);
    assert_eq!(log.failure_reason, "");
    assert!(log.warnings.is_empty());
    assert_eq!(caps, ConstraintCaps::unconstrained());
}

#[test]
fn caps_take_the_maximum_along_the_branch() {
    let clock = FixedClock::new(t0());
    let mut node = ConstraintNode::and(vec![
        leaf(ConstraintKind::FunctionGate(FunctionGate::default())).with_caps(10, -1),
        leaf(ConstraintKind::FunctionGate(FunctionGate::default())).with_caps(3, 24),
    ])
    .scoped(target().scope);
    let (ok, _, caps) = run(&mut node, &request(), &clock);
    assert!(ok);
    assert_eq!(caps, ConstraintCaps { volume: 10, runtime: 24 });
}

#[test]
fn warnings_substitute_node_fields() {
    let clock = FixedClock::new(t0());
    let mut node = leaf(ConstraintKind::Usage(UsageLimit::new(30, -1, -1)))
        .named("Trial")
        .with_warning("<name>: <max_usage> uses allowed");
    let (ok, log, _) = run(&mut node, &request(), &clock);
    assert!(ok);
    assert_eq!(log.warnings, vec!["Trial: 30 uses allowed".to_string()]);
}

#[test]
fn unknown_tag_does_not_deserialize() {
    let json = r#"{"name":"x","type":"processor","count":4}"#;
    assert!(serde_json::from_str::<ConstraintNode>(json).is_err());
}

#[test]
fn every_tag_round_trips() {
    let nodes = vec![
        ConstraintNode::and(Vec::new()),
        ConstraintNode::or(Vec::new()),
        leaf(ConstraintKind::TimeWindow(TimeWindow::new(vec![TimeRange::new(0, 2400)]))),
        leaf(ConstraintKind::DateRange(DateRange::days_from_first_use(30))),
        leaf(ConstraintKind::Beta(Beta::until(t0()))),
        leaf(ConstraintKind::Domain(DomainList::new(["acme.test"]))),
        leaf(ConstraintKind::FunctionGate(FunctionGate::default())),
        leaf(ConstraintKind::Usage(UsageLimit::new(1, 2, 3))),
        leaf(ConstraintKind::VersionRange(VersionRange::new(Version::parse("1").unwrap(), Version::parse("2").unwrap()))),
        leaf(ConstraintKind::ExecutionMode(ExecutionMode::requiring(UsageMode::Design))),
    ];
    let tags: Vec<&str> = nodes.iter().map(|n| n.kind.tag()).collect();
    assert_eq!(tags, ConstraintKind::TAGS.to_vec());

    for node in nodes {
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", node.kind.tag())));
        let parsed: ConstraintNode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, node);
    }
}
