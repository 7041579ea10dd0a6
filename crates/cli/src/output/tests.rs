use std::sync::Arc;

use pw_targets::{BasicTarget, Target, TargetInfo, TargetType};
use serde_json::{Value, json};

use super::*;

fn page(id: &str) -> TargetInfo {
	TargetInfo::new(id, TargetType::Page).with_url(format!("https://example.com/{id}"))
}

fn handle(info: TargetInfo) -> Arc<dyn Target> {
	Arc::new(BasicTarget::new(info, None))
}

fn render_notification(format: OutputFormat, notification: &TargetNotification) -> String {
	colored::control::set_override(false);
	let mut out = Vec::new();
	write_notification(&mut out, format, notification).unwrap();
	String::from_utf8(out).unwrap()
}

fn render_targets(format: OutputFormat, targets: &[TargetRecord]) -> String {
	colored::control::set_override(false);
	let mut out = Vec::new();
	write_targets(&mut out, format, targets).unwrap();
	String::from_utf8(out).unwrap()
}

#[test]
fn notification_record_fields() {
	let record = NotificationRecord::from(&TargetNotification::Available(handle(page("T1"))));
	assert_eq!(
		serde_json::to_value(&record).unwrap(),
		json!({
			"event": "available",
			"targetId": "T1",
			"type": "page",
			"url": "https://example.com/T1",
			"title": "",
			"attached": true
		})
	);
}

#[test]
fn gone_and_discovered_are_not_attached() {
	let target = handle(page("T1"));
	let gone = NotificationRecord::from(&TargetNotification::Gone {
		target,
		info: page("T1"),
	});
	assert_eq!(gone.event, "gone");
	assert!(!gone.target.attached);

	let discovered = NotificationRecord::from(&TargetNotification::Discovered(page("T2")));
	assert_eq!(discovered.event, "discovered");
	assert!(!discovered.target.attached);
}

#[test]
fn changed_uses_new_snapshot() {
	let target = handle(page("T1"));
	let info = page("T1").with_url("https://example.com/next");
	let record = NotificationRecord::from(&TargetNotification::Changed { target, info });
	assert_eq!(record.target.url, "https://example.com/next");
	assert!(record.target.attached);
}

#[test]
fn ndjson_notification_is_one_line() {
	let out = render_notification(OutputFormat::Ndjson, &TargetNotification::Discovered(page("T1")));
	assert!(out.ends_with('\n'));
	assert_eq!(out.lines().count(), 1);

	let value: Value = serde_json::from_str(out.trim_end()).unwrap();
	assert_eq!(value["event"], "discovered");
	assert_eq!(value["targetId"], "T1");
}

#[test]
fn text_notification_line() {
	let out = render_notification(OutputFormat::Text, &TargetNotification::Available(handle(page("T1"))));
	assert_eq!(out, format!("{:<10} {:<16} T1 https://example.com/T1\n", "available", "page"));
}

#[test]
fn opener_is_serialized_when_present() {
	let mut info = TargetInfo::new("POPUP", TargetType::Page);
	info.opener_id = Some("T1".into());
	let record = TargetRecord::from_info(&info, true);
	assert_eq!(serde_json::to_value(&record).unwrap()["openerId"], "T1");

	let record = TargetRecord::from_info(&page("T2"), true);
	assert!(serde_json::to_value(&record).unwrap().get("openerId").is_none());
}

#[test]
fn json_listing_has_schema_version() {
	let targets = vec![TargetRecord::from_info(&page("T1"), true)];
	let out = render_targets(OutputFormat::Json, &targets);

	let value: Value = serde_json::from_str(&out).unwrap();
	assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
	assert_eq!(value["targets"].as_array().unwrap().len(), 1);
	assert_eq!(value["targets"][0]["targetId"], "T1");
}

#[test]
fn ndjson_listing_one_record_per_line() {
	let targets = vec![
		TargetRecord::from_info(&page("T1"), true),
		TargetRecord::from_info(&page("T2"), false),
	];
	let out = render_targets(OutputFormat::Ndjson, &targets);
	let lines: Vec<Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
	assert_eq!(lines.len(), 2);
	assert_eq!(lines[1]["attached"], false);
}

#[test]
fn text_listing_marks_unattached() {
	let targets = vec![
		TargetRecord::from_info(&page("T1"), true),
		TargetRecord::from_info(&page("T2"), false),
	];
	let out = render_targets(OutputFormat::Text, &targets);
	let lines: Vec<&str> = out.lines().collect();
	assert_eq!(lines.len(), 2);
	assert!(!lines[0].contains("not attached"));
	assert!(lines[1].ends_with("(not attached)"));
}

#[test]
fn empty_text_listing() {
	assert_eq!(render_targets(OutputFormat::Text, &[]), "no targets\n");
	assert_eq!(render_targets(OutputFormat::Ndjson, &[]), "");
}
