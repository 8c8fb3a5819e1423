use std::{
	collections::{HashMap, HashSet},
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use workspace_ldap::{DirectorySource, Group, Member, Page, SourceError, User, UserName};

pub const DOMAIN: &str = "example.com";
pub const SUFFIX: &str = "dc=example,dc=com";
pub const USERS: &str = "cn=users,dc=example,dc=com";
pub const GROUPS: &str = "cn=groups,dc=example,dc=com";

pub fn init_tracing() {
	let filter = EnvFilter::builder().with_default_directive(LevelFilter::DEBUG.into()).from_env_lossy();
	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
}

pub fn user_dn(email: &str) -> String {
	format!("cn={email},{USERS}")
}

pub fn group_dn(email: &str) -> String {
	format!("cn={email},{GROUPS}")
}

/// An in-memory identity provider.
///
/// Listings are served in pages of at most `page_limit` records (or the
/// requested page size if smaller), with the offset as page token.
#[derive(Debug, Default)]
pub struct FakeSource {
	users: Mutex<Vec<User>>,
	groups: Mutex<Vec<Group>>,
	members: Mutex<HashMap<String, Vec<Member>>>,
	broken_groups: Mutex<HashSet<String>>,
	failing: AtomicBool,
	delay: Mutex<Option<Duration>>,
	page_limit: Option<usize>,
	pub user_calls: AtomicUsize,
	pub group_calls: AtomicUsize,
	pub member_calls: AtomicUsize,
}

impl FakeSource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_page_limit(page_limit: usize) -> Self {
		Self { page_limit: Some(page_limit), ..Self::default() }
	}

	pub fn add_user(&self, email: &str) {
		let mut users = self.users.lock().unwrap();
		let id = format!("u{}", users.len());
		users.push(User {
			id,
			primary_email: email.to_owned(),
			name: UserName { given_name: "Given".to_owned(), family_name: "Family".to_owned() },
			aliases: Vec::new(),
			enrolled_in_2fa: false,
			archived: false,
			suspended: false,
		});
	}

	pub fn set_users(&self, emails: &[String]) {
		self.users.lock().unwrap().clear();
		for email in emails {
			self.add_user(email);
		}
	}

	pub fn add_group(&self, email: &str, members: &[&str]) {
		let mut groups = self.groups.lock().unwrap();
		let id = format!("g{}", groups.len());
		self.members.lock().unwrap().insert(
			id.clone(),
			members
				.iter()
				.map(|email| Member { id: String::new(), email: (*email).to_owned() })
				.collect(),
		);
		groups.push(Group { id, email: email.to_owned(), aliases: Vec::new() });
	}

	/// Make listing the members of the group `email` fail.
	pub fn break_group(&self, email: &str) {
		let groups = self.groups.lock().unwrap();
		let group = groups.iter().find(|g| g.email == email).expect("group exists");
		self.broken_groups.lock().unwrap().insert(group.id.clone());
	}

	/// Make every user and group listing fail.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	/// Delay every request by `delay`.
	pub fn set_delay(&self, delay: Option<Duration>) {
		*self.delay.lock().unwrap() = delay;
	}

	async fn request(&self) -> Result<(), SourceError> {
		let delay = *self.delay.lock().unwrap();
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		if self.failing.load(Ordering::SeqCst) {
			return Err(SourceError::Api { status: 503, message: "Backend Error".to_owned() });
		}
		Ok(())
	}

	fn page<T: Clone>(&self, items: &[T], page_size: u32, page_token: Option<String>) -> Page<T> {
		let offset: usize = page_token.map_or(0, |token| token.parse().unwrap());
		let mut size = page_size as usize;
		if let Some(limit) = self.page_limit {
			size = size.min(limit);
		}
		let end = (offset + size).min(items.len());
		let next_page_token = (end < items.len()).then(|| end.to_string());
		Page { items: items[offset..end].to_vec(), next_page_token }
	}
}

#[async_trait]
impl DirectorySource for FakeSource {
	async fn list_users(
		&self,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<User>, SourceError> {
		self.user_calls.fetch_add(1, Ordering::SeqCst);
		self.request().await?;
		let users = self.users.lock().unwrap().clone();
		Ok(self.page(&users, page_size, page_token))
	}

	async fn list_groups(
		&self,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<Group>, SourceError> {
		self.group_calls.fetch_add(1, Ordering::SeqCst);
		self.request().await?;
		let groups = self.groups.lock().unwrap().clone();
		Ok(self.page(&groups, page_size, page_token))
	}

	async fn list_members(
		&self,
		group_id: &str,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<Member>, SourceError> {
		self.member_calls.fetch_add(1, Ordering::SeqCst);
		if self.broken_groups.lock().unwrap().contains(group_id) {
			return Err(SourceError::Transport("connection reset".into()));
		}
		let members = self.members.lock().unwrap().get(group_id).cloned().unwrap_or_default();
		Ok(self.page(&members, page_size, page_token))
	}
}
