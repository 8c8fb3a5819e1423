//! Retrieval of the full catalog from the identity provider.

use std::{collections::HashSet, future::Future, marker::PhantomData, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
	dn::{build_dn, Category},
	entry::Entry,
	error::Error,
	source::{DirectorySource, Group, Page, SourceError},
};

/// Number of users requested per page.
pub const USER_PAGE_SIZE: u32 = 500;
/// Number of groups requested per page.
pub const GROUP_PAGE_SIZE: u32 = 200;
/// Number of members requested per page.
pub const MEMBER_PAGE_SIZE: u32 = 200;

/// What to do after handling a record of a listing. Failures travel
/// separately as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFlow {
	/// Keep reading.
	Continue,
	/// Enough has been read, stop without error.
	Stop,
}

/// Walks a paginated listing one page at a time.
struct Pager<T, F> {
	/// Requests a page given the continuation token.
	fetch: F,
	/// Continuation for the next request.
	token: Option<String>,
	/// Set once the last page has been handed out.
	exhausted: bool,
	/// Record type of the listing.
	_items: PhantomData<fn() -> T>,
}

impl<T, F, Fut> Pager<T, F>
where
	F: FnMut(Option<String>) -> Fut,
	Fut: Future<Output = Result<Page<T>, SourceError>>,
{
	/// Start a listing at its first page.
	fn new(fetch: F) -> Self {
		Self { fetch, token: None, exhausted: false, _items: PhantomData }
	}

	/// Fetch the next page, or `None` once the listing is exhausted.
	async fn next_page(&mut self) -> Result<Option<Vec<T>>, SourceError> {
		if self.exhausted {
			return Ok(None);
		}
		let page = (self.fetch)(self.token.take()).await?;
		match page.next_page_token {
			Some(token) if !token.is_empty() => self.token = Some(token),
			_ => self.exhausted = true,
		}
		Ok(Some(page.items))
	}
}

/// Builds the entries of one refresh cycle from a [`DirectorySource`].
pub struct Fetcher {
	/// Where records come from.
	source: Arc<dyn DirectorySource>,
	/// Naming suffix all entries are placed under.
	suffix: String,
}

impl std::fmt::Debug for Fetcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Fetcher").field("suffix", &self.suffix).finish_non_exhaustive()
	}
}

impl Fetcher {
	/// Create a fetcher placing entries under `suffix`.
	#[must_use]
	pub fn new(source: Arc<dyn DirectorySource>, suffix: String) -> Self {
		Self { source, suffix }
	}

	/// The naming suffix entries are placed under.
	#[must_use]
	pub fn suffix(&self) -> &str {
		&self.suffix
	}

	/// Fetch every user followed by up to `max_groups` groups (all of them if
	/// `max_groups` is zero).
	///
	/// Fails as a whole if any user or group page cannot be listed, or if
	/// `ctx` is cancelled first. A group whose members cannot be listed is
	/// left out instead.
	pub async fn fetch(
		&self,
		ctx: &CancellationToken,
		max_groups: usize,
	) -> Result<Vec<Entry>, Error> {
		tokio::select! {
			biased;
			() = ctx.cancelled() => Err(Error::Cancelled),
			entries = self.fetch_all(max_groups) => entries,
		}
	}

	/// Fetch users, then groups.
	async fn fetch_all(&self, max_groups: usize) -> Result<Vec<Entry>, Error> {
		let mut entries = self.fetch_users().await?;
		entries.extend(self.fetch_groups(max_groups).await?);
		Ok(entries)
	}

	/// Fetch and convert all users. A user listed again on a later page is
	/// kept once.
	async fn fetch_users(&self) -> Result<Vec<Entry>, Error> {
		debug!(page_size = USER_PAGE_SIZE, "Fetching users");
		let source = &*self.source;
		let mut pager = Pager::new(move |token| source.list_users(USER_PAGE_SIZE, token));

		let mut out = Vec::new();
		let mut seen = HashSet::new();
		while let Some(users) = pager.next_page().await? {
			for user in users {
				if user.primary_email.is_empty() {
					warn!(id = %user.id, "Skipping user without primary email");
					continue;
				}
				let entry = Entry::from_user(&user, &self.suffix);
				if !seen.insert(entry.dn.clone()) {
					warn!(dn = %entry.dn, "Dropping user with duplicate name");
					continue;
				}
				out.push(entry);
			}
		}
		Ok(out)
	}

	/// Fetch and convert groups until the listing ends or `max_groups` have
	/// been produced. A group listed again on a later page is kept once and
	/// counted once.
	async fn fetch_groups(&self, max_groups: usize) -> Result<Vec<Entry>, Error> {
		debug!(page_size = GROUP_PAGE_SIZE, max_groups, "Fetching groups");
		let source = &*self.source;
		let mut pager = Pager::new(move |token| source.list_groups(GROUP_PAGE_SIZE, token));

		let mut out = Vec::new();
		let mut seen = HashSet::new();
		let mut skipped = 0_usize;
		'pages: while let Some(groups) = pager.next_page().await? {
			for group in groups {
				if group.email.is_empty() {
					warn!(id = %group.id, "Skipping group without email");
					continue;
				}
				let dn = build_dn(&group.email, Category::Groups, &self.suffix);
				if seen.contains(&dn) {
					warn!(dn = %dn, "Dropping group with duplicate name");
					continue;
				}
				let Some(entry) = self.group_entry(&group).await else {
					skipped += 1;
					continue;
				};
				seen.insert(dn);
				out.push(entry);
				if group_flow(out.len(), max_groups) == PageFlow::Stop {
					debug!(max_groups, "Group limit reached");
					break 'pages;
				}
			}
		}

		if skipped > 0 {
			info!(skipped, "Some groups were left out because their members could not be read");
		}
		Ok(out)
	}

	/// Convert a group after resolving its members, or `None` if the members
	/// could not be read.
	async fn group_entry(&self, group: &Group) -> Option<Entry> {
		debug!(email = %group.email, id = %group.id, "Reading group members");
		match self.member_emails(group).await {
			Ok(members) => {
				Some(Entry::from_group(group, members.iter().map(String::as_str), &self.suffix))
			}
			Err(err) => {
				error!(email = %group.email, id = %group.id, "Fail to fetch group members: {err}");
				None
			}
		}
	}

	/// List the addresses of every member of a group.
	async fn member_emails(&self, group: &Group) -> Result<Vec<String>, SourceError> {
		let source = &*self.source;
		let id = group.id.as_str();
		let mut pager = Pager::new(move |token| source.list_members(id, MEMBER_PAGE_SIZE, token));

		let mut emails = Vec::new();
		while let Some(members) = pager.next_page().await? {
			emails.extend(
				members.into_iter().map(|member| member.email).filter(|email| !email.is_empty()),
			);
		}
		Ok(emails)
	}
}

/// Whether group accumulation continues after `produced` groups.
fn group_flow(produced: usize, max_groups: usize) -> PageFlow {
	if max_groups > 0 && produced >= max_groups {
		PageFlow::Stop
	} else {
		PageFlow::Continue
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::sync::{
		atomic::{AtomicUsize, Ordering},
		Arc,
	};

	use async_trait::async_trait;
	use tokio_util::sync::CancellationToken;

	use super::{group_flow, Fetcher, PageFlow};
	use crate::{
		error::Error,
		source::{DirectorySource, Group, Member, Page, SourceError, User},
	};

	/// Serves three pages of one user each, then one group.
	#[derive(Default)]
	struct ThreePages {
		/// Number of user requests seen.
		user_calls: AtomicUsize,
	}

	#[async_trait]
	impl DirectorySource for ThreePages {
		async fn list_users(
			&self,
			_page_size: u32,
			page_token: Option<String>,
		) -> Result<Page<User>, SourceError> {
			self.user_calls.fetch_add(1, Ordering::SeqCst);
			let index: usize = page_token.as_deref().unwrap_or("0").parse().unwrap();
			let user = User {
				id: index.to_string(),
				primary_email: format!("user{index}@example.com"),
				..User::default()
			};
			let next_page_token = match index {
				0 => Some("1".to_owned()),
				1 => Some("2".to_owned()),
				_ => Some(String::new()),
			};
			Ok(Page { items: vec![user], next_page_token })
		}

		async fn list_groups(
			&self,
			_page_size: u32,
			_page_token: Option<String>,
		) -> Result<Page<Group>, SourceError> {
			Ok(Page::last(vec![Group {
				id: "g".to_owned(),
				email: "user0@example.com".to_owned(),
				aliases: Vec::new(),
			}]))
		}

		async fn list_members(
			&self,
			_group_id: &str,
			_page_size: u32,
			_page_token: Option<String>,
		) -> Result<Page<Member>, SourceError> {
			Ok(Page::last(Vec::new()))
		}
	}

	/// Serves listings whose second page repeats the last record of the first,
	/// as happens when the upstream catalog shifts between requests.
	struct ShiftingPages;

	/// Split `items` into a first page of two and a second page starting
	/// again at the second item.
	fn shifted<T: Clone>(items: &[T], page_token: Option<String>) -> Page<T> {
		match page_token.as_deref() {
			None => Page { items: items[..2].to_vec(), next_page_token: Some("1".to_owned()) },
			Some(_) => Page::last(items[1..].to_vec()),
		}
	}

	#[async_trait]
	impl DirectorySource for ShiftingPages {
		async fn list_users(
			&self,
			_page_size: u32,
			page_token: Option<String>,
		) -> Result<Page<User>, SourceError> {
			let users: Vec<_> = (0..3)
				.map(|index| User {
					id: format!("u{index}"),
					primary_email: format!("user{index}@example.com"),
					..User::default()
				})
				.collect();
			Ok(shifted(&users, page_token))
		}

		async fn list_groups(
			&self,
			_page_size: u32,
			page_token: Option<String>,
		) -> Result<Page<Group>, SourceError> {
			let groups: Vec<_> = (0..4)
				.map(|index| Group {
					id: format!("g{index}"),
					email: format!("group{index}@example.com"),
					aliases: Vec::new(),
				})
				.collect();
			Ok(shifted(&groups, page_token))
		}

		async fn list_members(
			&self,
			_group_id: &str,
			_page_size: u32,
			_page_token: Option<String>,
		) -> Result<Page<Member>, SourceError> {
			Ok(Page::last(Vec::new()))
		}
	}

	#[test]
	fn group_flow_stops_at_limit() {
		assert_eq!(group_flow(1, 0), PageFlow::Continue, "Zero means unlimited");
		assert_eq!(group_flow(1, 2), PageFlow::Continue);
		assert_eq!(group_flow(2, 2), PageFlow::Stop);
	}

	#[tokio::test]
	async fn follows_page_tokens_until_empty() -> Result<(), Box<dyn std::error::Error>> {
		let source = Arc::new(ThreePages::default());
		let fetcher = Fetcher::new(source.clone(), "dc=example,dc=com".to_owned());

		let entries = fetcher.fetch(&CancellationToken::new(), 0).await?;

		assert_eq!(source.user_calls.load(Ordering::SeqCst), 3);
		let names: Vec<_> = entries.iter().map(|e| e.dn.as_str()).collect();
		assert_eq!(
			names,
			[
				"cn=user0@example.com,cn=users,dc=example,dc=com",
				"cn=user1@example.com,cn=users,dc=example,dc=com",
				"cn=user2@example.com,cn=users,dc=example,dc=com",
				"cn=user0@example.com,cn=groups,dc=example,dc=com",
			]
		);
		Ok(())
	}

	#[tokio::test]
	async fn repeated_records_count_once() -> Result<(), Box<dyn std::error::Error>> {
		let fetcher = Fetcher::new(Arc::new(ShiftingPages), "dc=example,dc=com".to_owned());

		let entries = fetcher.fetch(&CancellationToken::new(), 3).await?;
		let names: Vec<_> = entries.iter().map(|e| e.dn.as_str()).collect();
		assert_eq!(
			names,
			[
				"cn=user0@example.com,cn=users,dc=example,dc=com",
				"cn=user1@example.com,cn=users,dc=example,dc=com",
				"cn=user2@example.com,cn=users,dc=example,dc=com",
				"cn=group0@example.com,cn=groups,dc=example,dc=com",
				"cn=group1@example.com,cn=groups,dc=example,dc=com",
				"cn=group2@example.com,cn=groups,dc=example,dc=com",
			],
			"The limit counts distinct groups"
		);

		let entries = fetcher.fetch(&CancellationToken::new(), 0).await?;
		assert_eq!(entries.len(), 3 + 4);
		Ok(())
	}

	#[tokio::test]
	async fn cancelled_fetch_returns_nothing() {
		let fetcher = Fetcher::new(Arc::new(ThreePages::default()), String::new());
		let ctx = CancellationToken::new();
		ctx.cancel();

		assert!(matches!(fetcher.fetch(&ctx, 0).await, Err(Error::Cancelled)));
	}
}
