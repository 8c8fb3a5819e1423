//! The directory: keeps the catalog fresh and answers queries against it.

use std::sync::{
	atomic::{AtomicU64, Ordering},
	Arc,
};

use async_trait::async_trait;
use ldap3::LdapResult;
use tokio::{
	task::JoinHandle,
	time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
	cache::{Snapshot, SnapshotCache},
	config::Config,
	entry::Entry,
	error::Error,
	fetch::Fetcher,
	search::{
		is_sasl_probe, sasl_mechanisms_entry, subtree_search, success, BindHandler, SearchHandler,
		SearchRequest, SearchResult,
	},
	source::DirectorySource,
};

/// Serves the catalog of a [`DirectorySource`] as a directory tree.
///
/// Obtained through [`Directory::connect`], which loads the catalog once, so
/// a `Directory` never answers from a catalog that was never populated.
#[derive(Debug)]
pub struct Directory {
	/// The configuration of the directory.
	config: Config,
	/// Builds new catalogs.
	fetcher: Fetcher,
	/// The published catalog.
	cache: SnapshotCache,
	/// Operation counters.
	counters: Counters,
}

/// Counts of operations handled by a [`Directory`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
	/// Bind requests handled.
	pub binds: u64,
	/// Search requests handled.
	pub searches: u64,
	/// Refreshes that published a new snapshot.
	pub refreshes: u64,
	/// Refreshes that failed and left the previous snapshot in place.
	pub failed_refreshes: u64,
}

/// Live counters behind [`Stats`].
#[derive(Debug, Default)]
struct Counters {
	/// See [`Stats::binds`].
	binds: AtomicU64,
	/// See [`Stats::searches`].
	searches: AtomicU64,
	/// See [`Stats::refreshes`].
	refreshes: AtomicU64,
	/// See [`Stats::failed_refreshes`].
	failed_refreshes: AtomicU64,
}

/// Add one to a counter.
fn bump(counter: &AtomicU64) {
	counter.fetch_add(1, Ordering::Relaxed);
}

impl Directory {
	/// Create a directory and load its catalog for the first time.
	///
	/// Fails if the configuration is invalid or the initial load fails; the
	/// caller must not start serving in that case.
	pub async fn connect(
		config: Config,
		source: Arc<dyn DirectorySource>,
	) -> Result<Arc<Self>, Error> {
		config.validate()?;
		if let Some(subject) = &config.impersonate {
			info!(subject = %subject, "Upstream requests act on behalf of another account");
		}

		let fetcher = Fetcher::new(source, config.base_dn());
		let directory =
			Self { config, fetcher, cache: SnapshotCache::new(), counters: Counters::default() };

		info!(base_dn = directory.fetcher.suffix(), "Fetching catalog");
		directory.update(&CancellationToken::new()).await?;
		Ok(Arc::new(directory))
	}

	/// The configuration of this directory.
	#[must_use]
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// The naming suffix all entries live under.
	#[must_use]
	pub fn base_dn(&self) -> &str {
		self.fetcher.suffix()
	}

	/// The currently published snapshot.
	pub async fn snapshot(&self) -> Arc<Snapshot> {
		self.cache.read().await
	}

	/// Counts of operations handled so far.
	#[must_use]
	pub fn stats(&self) -> Stats {
		Stats {
			binds: self.counters.binds.load(Ordering::Relaxed),
			searches: self.counters.searches.load(Ordering::Relaxed),
			refreshes: self.counters.refreshes.load(Ordering::Relaxed),
			failed_refreshes: self.counters.failed_refreshes.load(Ordering::Relaxed),
		}
	}

	/// Fetch the whole catalog and publish it, returning the new generation.
	///
	/// On failure nothing is published and the previous snapshot stays in
	/// place.
	pub async fn update(&self, ctx: &CancellationToken) -> Result<u64, Error> {
		match self.fetch(ctx).await {
			Ok(entries) => {
				let count = entries.len();
				let generation = self.cache.replace(entries).await;
				bump(&self.counters.refreshes);
				info!(entries = count, generation, "Catalog refreshed");
				Ok(generation)
			}
			Err(err) => {
				bump(&self.counters.failed_refreshes);
				Err(err)
			}
		}
	}

	/// Fetch the catalog within the configured deadline.
	async fn fetch(&self, ctx: &CancellationToken) -> Result<Vec<Entry>, Error> {
		let fetch = self.fetcher.fetch(ctx, self.config.max_groups);
		match self.config.fetch_timeout {
			Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| Error::Timeout)?,
			None => fetch.await,
		}
	}

	/// Copies of every entry at or below `base_dn`, or the SASL mechanism
	/// answer if `attributes` asks for exactly that.
	pub async fn search_subtree(&self, base_dn: &str, attributes: &[String]) -> Vec<Entry> {
		if is_sasl_probe(attributes) {
			return vec![sasl_mechanisms_entry()];
		}
		let snapshot = self.cache.read().await;
		subtree_search(&snapshot, base_dn)
	}

	/// Refresh the catalog every configured period until `ctx` is cancelled.
	///
	/// The first refresh happens one period after the call. Failed refreshes
	/// are logged and the next one proceeds on schedule.
	pub async fn sync(&self, ctx: CancellationToken) {
		let period = self.config.refresh_period;
		if period.is_zero() {
			debug!("Periodic refresh disabled");
			return;
		}

		let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				biased;
				() = ctx.cancelled() => {
					info!("Stopping periodic refresh");
					return;
				}
				_ = ticker.tick() => {}
			}

			match self.update(&ctx).await {
				Ok(_) => {}
				Err(Error::Cancelled) => debug!("Refresh interrupted by shutdown"),
				Err(err) if err.is_timeout() => warn!("Fail to update catalog in time: {err}"),
				Err(err) => error!("Fail to update catalog: {err}"),
			}
		}
	}

	/// Run [`Directory::sync`] in the background, unless the refresh period
	/// is zero. Cancel `ctx` or abort the handle to stop it.
	#[must_use]
	pub fn spawn_refresher(self: &Arc<Self>, ctx: CancellationToken) -> Option<JoinHandle<()>> {
		if self.config.refresh_period.is_zero() {
			return None;
		}
		let directory = Arc::clone(self);
		Some(tokio::spawn(async move { directory.sync(ctx).await }))
	}
}

/// Every credential is accepted. Clients are expected to be trusted at the
/// network level.
#[async_trait]
impl BindHandler for Directory {
	async fn bind(&self, dn: &str, _password: &str) -> LdapResult {
		bump(&self.counters.binds);
		debug!(bind_dn = dn, "Incoming bind request");
		success()
	}
}

#[async_trait]
impl SearchHandler for Directory {
	async fn search(&self, bound_dn: &str, request: &SearchRequest) -> SearchResult {
		bump(&self.counters.searches);
		info!(
			bound_dn,
			base_dn = %request.base_dn,
			scope = ?request.scope,
			filter = %request.filter,
			size_limit = request.size_limit,
			time_limit = request.time_limit,
			attributes = ?request.attributes,
			"Incoming search request"
		);
		SearchResult::success(self.search_subtree(&request.base_dn, &request.attributes).await)
	}
}
