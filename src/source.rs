//! The contract with the upstream identity provider.
//!
//! The directory only needs three paginated listings. Clients for a concrete
//! provider implement [`DirectorySource`] and decode responses into the record
//! types below, which follow the upstream directory API's JSON shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A user account as listed by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
	/// The immutable unique id of the user.
	pub id: String,
	/// The address the user is known by, also used to name its entry.
	pub primary_email: String,
	/// Structured name.
	#[serde(default)]
	pub name: UserName,
	/// Additional addresses of the user.
	#[serde(default)]
	pub aliases: Vec<String>,
	/// Whether the user enrolled in two-step verification.
	#[serde(default, rename = "isEnrolledIn2Sv")]
	pub enrolled_in_2fa: bool,
	/// Whether the account is archived.
	#[serde(default)]
	pub archived: bool,
	/// Whether the account is suspended.
	#[serde(default)]
	pub suspended: bool,
}

/// Name parts of a [`User`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
	/// First name.
	#[serde(default)]
	pub given_name: String,
	/// Last name.
	#[serde(default)]
	pub family_name: String,
}

/// A group as listed by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
	/// The immutable unique id of the group, used to list its members.
	pub id: String,
	/// The address of the group, also used to name its entry.
	pub email: String,
	/// Additional addresses of the group.
	#[serde(default)]
	pub aliases: Vec<String>,
}

/// A membership of a [`Group`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
	/// The id of the member.
	#[serde(default)]
	pub id: String,
	/// The address of the member.
	pub email: String,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
	/// Records on this page, in upstream order.
	pub items: Vec<T>,
	/// Continuation for the next page; `None` or empty on the last page.
	pub next_page_token: Option<String>,
}

impl<T> Page<T> {
	/// A page with no successor.
	#[must_use]
	pub fn last(items: Vec<T>) -> Self {
		Self { items, next_page_token: None }
	}
}

/// Paginated access to the identity provider's catalog.
///
/// Every call fetches exactly one page. `page_token` is `None` for the first
/// page and the previous page's `next_page_token` afterwards.
#[async_trait]
pub trait DirectorySource: Send + Sync {
	/// List one page of users.
	async fn list_users(
		&self,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<User>, SourceError>;

	/// List one page of groups.
	async fn list_groups(
		&self,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<Group>, SourceError>;

	/// List one page of the members of the group with id `group_id`.
	async fn list_members(
		&self,
		group_id: &str,
		page_size: u32,
		page_token: Option<String>,
	) -> Result<Page<Member>, SourceError>;
}

/// Errors reported by a [`DirectorySource`].
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
	/// The request did not complete, e.g. a network failure.
	#[error("Upstream request failed: {0}")]
	Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
	/// The provider answered with an error.
	#[error("Upstream API error {status}: {message}")]
	Api {
		/// Status code of the response.
		status: u16,
		/// Message returned by the provider.
		message: String,
	},
}
