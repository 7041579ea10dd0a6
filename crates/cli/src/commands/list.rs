use pw_targets::TargetManager;

use super::Attached;
use crate::error::Result;
use crate::output::{self, OutputFormat, TargetRecord};

/// Used when neither the config file nor `--timeout-ms` bounds startup.
pub(crate) const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub async fn run(attached: Attached, format: OutputFormat, all: bool) -> Result<()> {
	let records = attached
		.manager
		.initialize()
		.await
		.map(|()| collect(&attached.manager, all));
	attached.shutdown("list finished").await;

	output::write_targets(&mut std::io::stdout(), format, &records?)
}

/// Attached targets, plus unattached discovered ones when `all` is set,
/// sorted by target id.
pub(crate) fn collect(manager: &TargetManager, all: bool) -> Vec<TargetRecord> {
	let attached = manager.attached_targets();
	let mut records: Vec<TargetRecord> = attached
		.values()
		.map(|target| TargetRecord::from_info(&target.info(), true))
		.collect();

	if all {
		records.extend(
			manager
				.discovered_targets()
				.into_iter()
				.filter(|(id, _)| !attached.contains_key(id))
				.map(|(_, info)| TargetRecord::from_info(&info, false)),
		);
	}

	records.sort_by(|a, b| a.target_id.cmp(&b.target_id));
	records
}

#[cfg(test)]
mod tests {
	use pw_targets::{TargetInfo, TargetManagerConfig, TargetType, TransportParts, only_types};

	use super::*;
	use crate::commands::fake_browser::FakeBrowser;

	fn page(id: &str) -> TargetInfo {
		TargetInfo::new(id, TargetType::Page).with_url(format!("https://example.com/{id}"))
	}

	#[tokio::test]
	async fn lists_attached_targets_sorted() {
		let (parts, remote) = TransportParts::pair();
		let browser = FakeBrowser::spawn(remote, vec![page("T2"), page("T1")]);
		let attached = Attached::start(parts, TargetManagerConfig::default(), None);

		attached.manager.initialize().await.unwrap();
		let records = collect(&attached.manager, false);

		let ids: Vec<&str> = records.iter().map(|r| r.target_id.as_str()).collect();
		assert_eq!(ids, vec!["T1", "T2"]);
		assert!(records.iter().all(|r| r.attached));
		assert!(browser.received("Target.setDiscoverTargets"));
		assert!(browser.received("Target.setAutoAttach"));

		attached.shutdown("test finished").await;
	}

	#[tokio::test]
	async fn all_includes_filtered_targets() {
		let (parts, remote) = TransportParts::pair();
		let worker = TargetInfo::new("W1", TargetType::Worker).with_attached(true);
		let _browser = FakeBrowser::spawn(remote, vec![page("T1"), worker]);
		let attached = Attached::start(
			parts,
			TargetManagerConfig::default(),
			Some(only_types([TargetType::Page])),
		);

		attached.manager.initialize().await.unwrap();

		let attached_only = collect(&attached.manager, false);
		assert_eq!(attached_only.len(), 1);
		assert_eq!(attached_only[0].target_id, "T1");

		let everything = collect(&attached.manager, true);
		assert_eq!(everything.len(), 2);
		assert_eq!(everything[1].target_id, "W1");
		assert_eq!(everything[1].target_type, "worker");
		assert!(!everything[1].attached);

		attached.shutdown("test finished").await;
	}

	#[tokio::test]
	async fn empty_browser_lists_nothing() {
		let (parts, remote) = TransportParts::pair();
		let _browser = FakeBrowser::spawn(remote, Vec::new());
		let attached = Attached::start(parts, TargetManagerConfig::default(), None);

		attached.manager.initialize().await.unwrap();
		assert!(collect(&attached.manager, true).is_empty());

		attached.shutdown("test finished").await;
	}
}
