//! The published catalog and its atomic replacement.
use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::entry::Entry;

/// One fully built generation of the catalog. Never modified once
/// published.
#[derive(Debug, Clone)]
pub struct Snapshot {
	/// Counts successful replacements; the initial empty snapshot is 0.
	generation: u64,
	/// When this snapshot was published, `None` for the initial one.
	refreshed_at: Option<OffsetDateTime>,
	/// The catalog, users first.
	entries: Vec<Entry>,
}

impl Snapshot {
	/// The generation number of this snapshot.
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// When this snapshot was published.
	#[must_use]
	pub fn refreshed_at(&self) -> Option<OffsetDateTime> {
		self.refreshed_at
	}

	/// The entries of this snapshot in catalog order.
	#[must_use]
	pub fn entries(&self) -> &[Entry] {
		&self.entries
	}

	/// Whether this snapshot has never been populated by a refresh.
	#[must_use]
	pub fn is_initial(&self) -> bool {
		self.generation == 0
	}
}

/// Holds the current [`Snapshot`].
///
/// Readers and the writer only hold the lock while cloning or swapping the
/// [`Arc`]. The lock is fair, so a waiting writer is not starved by a stream
/// of readers.
#[derive(Debug)]
pub struct SnapshotCache {
	/// The currently published snapshot.
	current: RwLock<Arc<Snapshot>>,
}

impl Default for SnapshotCache {
	fn default() -> Self {
		Self::new()
	}
}

impl SnapshotCache {
	/// Create a cache holding an empty initial snapshot.
	#[must_use]
	pub fn new() -> Self {
		let initial = Snapshot { generation: 0, refreshed_at: None, entries: Vec::new() };
		Self { current: RwLock::new(Arc::new(initial)) }
	}

	/// Publish `entries` as the new snapshot, returning its generation.
	pub async fn replace(&self, entries: Vec<Entry>) -> u64 {
		let refreshed_at = Some(OffsetDateTime::now_utc());
		let mut current = self.current.write().await;
		let generation = current.generation + 1;
		*current = Arc::new(Snapshot { generation, refreshed_at, entries });
		generation
	}

	/// A handle on the current snapshot. It stays valid, and unchanged, when
	/// the snapshot is replaced afterwards.
	pub async fn read(&self) -> Arc<Snapshot> {
		Arc::clone(&*self.current.read().await)
	}
}
