//! Rendering of target records and notifications.
//!
//! `text` is for people and is colored when stdout is a terminal. `json` and
//! `ndjson` are stable for scripts:
//!
//! ```json
//! {"event":"available","targetId":"T1","type":"page","url":"https://example.com/","title":"","attached":true}
//! ```
//!
//! `watch` writes one JSON object per line in both machine formats. `list`
//! writes a single `{"schemaVersion":1,"targets":[...]}` document for `json`.

#[cfg(test)]
mod tests;

use std::io::Write;

use colored::Colorize;
use pw_targets::{TargetInfo, TargetNotification};
use serde::Serialize;

use crate::error::Result;

/// Current schema version of the `list --format json` document.
pub const SCHEMA_VERSION: u32 = 1;

/// Output format for CLI results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON output
	Json,
	/// Newline-delimited JSON (streaming)
	Ndjson,
}

impl std::fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			OutputFormat::Text => write!(f, "text"),
			OutputFormat::Json => write!(f, "json"),
			OutputFormat::Ndjson => write!(f, "ndjson"),
		}
	}
}

/// One target as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRecord {
	pub target_id: String,
	#[serde(rename = "type")]
	pub target_type: String,
	pub url: String,
	pub title: String,
	/// Whether the manager holds a handle for the target.
	pub attached: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub opener_id: Option<String>,
}

impl TargetRecord {
	pub fn from_info(info: &TargetInfo, attached: bool) -> Self {
		Self {
			target_id: info.target_id.to_string(),
			target_type: info.target_type.to_string(),
			url: info.url.clone(),
			title: info.title.clone(),
			attached,
			opener_id: info.opener_id.as_ref().map(ToString::to_string),
		}
	}
}

/// A notification as printed by `watch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationRecord {
	pub event: &'static str,
	#[serde(flatten)]
	pub target: TargetRecord,
}

impl From<&TargetNotification> for NotificationRecord {
	fn from(notification: &TargetNotification) -> Self {
		let attached = matches!(
			notification,
			TargetNotification::Available(_) | TargetNotification::Changed { .. }
		);
		Self {
			event: notification.kind(),
			target: TargetRecord::from_info(&notification.info(), attached),
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetList<'a> {
	schema_version: u32,
	targets: &'a [TargetRecord],
}

/// Writes one notification. Every format produces exactly one line.
pub fn write_notification(out: &mut impl Write, format: OutputFormat, notification: &TargetNotification) -> Result<()> {
	let record = NotificationRecord::from(notification);
	match format {
		OutputFormat::Text => {
			let event = format!("{:<10}", record.event);
			let event = match record.event {
				"available" => event.green().bold(),
				"changed" => event.yellow(),
				"gone" => event.red(),
				_ => event.dimmed(),
			};
			writeln!(
				out,
				"{event} {:<16} {} {}",
				record.target.target_type,
				record.target.target_id.cyan(),
				record.target.url
			)?;
		}
		OutputFormat::Json | OutputFormat::Ndjson => {
			serde_json::to_writer(&mut *out, &record)?;
			writeln!(out)?;
		}
	}
	out.flush()?;
	Ok(())
}

/// Writes a target listing.
pub fn write_targets(out: &mut impl Write, format: OutputFormat, targets: &[TargetRecord]) -> Result<()> {
	match format {
		OutputFormat::Text => {
			if targets.is_empty() {
				writeln!(out, "{}", "no targets".dimmed())?;
			}
			for target in targets {
				let marker = if target.attached { "" } else { " (not attached)" };
				writeln!(
					out,
					"{:<16} {} {}{}",
					target.target_type,
					target.target_id.cyan(),
					target.url,
					marker.dimmed()
				)?;
			}
		}
		OutputFormat::Json => {
			let list = TargetList {
				schema_version: SCHEMA_VERSION,
				targets,
			};
			serde_json::to_writer_pretty(&mut *out, &list)?;
			writeln!(out)?;
		}
		OutputFormat::Ndjson => {
			for target in targets {
				serde_json::to_writer(&mut *out, target)?;
				writeln!(out)?;
			}
		}
	}
	out.flush()?;
	Ok(())
}
