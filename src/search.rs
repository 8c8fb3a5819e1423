//! Subtree search over a snapshot, and the hooks a protocol server calls.

use async_trait::async_trait;
use ldap3::{LdapResult, Scope};

use crate::{
	cache::Snapshot,
	entry::{Attribute, Entry},
};

/// The attribute a client requests alone to discover SASL mechanisms.
pub const SASL_MECHANISMS: &str = "supportedSASLMechanisms";

/// Result code for a successful operation.
const SUCCESS: u32 = 0;

/// A search as received from a client.
///
/// Only `base_dn` and `attributes` influence the result; every search is
/// answered as a subtree search without filtering.
#[derive(Debug, Clone)]
pub struct SearchRequest {
	/// Name of the entry the search starts at.
	pub base_dn: String,
	/// Requested scope.
	pub scope: Scope,
	/// Requested filter, in string form.
	pub filter: String,
	/// Requested attributes.
	pub attributes: Vec<String>,
	/// Maximum number of entries requested, 0 for no limit.
	pub size_limit: i32,
	/// Maximum time in seconds requested, 0 for no limit.
	pub time_limit: i32,
}

impl SearchRequest {
	/// A subtree search for everything below `base_dn`.
	#[must_use]
	pub fn subtree(base_dn: &str) -> Self {
		Self {
			base_dn: base_dn.to_owned(),
			scope: Scope::Subtree,
			filter: "(objectClass=*)".to_owned(),
			attributes: Vec::new(),
			size_limit: 0,
			time_limit: 0,
		}
	}

	/// Whether this is a probe for supported SASL mechanisms rather than a
	/// catalog query.
	#[must_use]
	pub fn is_sasl_probe(&self) -> bool {
		is_sasl_probe(&self.attributes)
	}
}

/// Entries and outcome of a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
	/// Matching entries, owned by the caller.
	pub entries: Vec<Entry>,
	/// Outcome reported to the client.
	pub result: LdapResult,
}

impl SearchResult {
	/// A successful result carrying `entries`.
	#[must_use]
	pub fn success(entries: Vec<Entry>) -> Self {
		Self { entries, result: success() }
	}
}

/// An [`LdapResult`] reporting success.
#[must_use]
pub fn success() -> LdapResult {
	LdapResult {
		rc: SUCCESS,
		matched: String::new(),
		text: String::new(),
		refs: Vec::new(),
		ctrls: Vec::new(),
	}
}

/// Whether `attributes` requests nothing but the supported SASL mechanisms.
#[must_use]
pub fn is_sasl_probe(attributes: &[String]) -> bool {
	matches!(attributes, [attr] if attr == SASL_MECHANISMS)
}

/// Copy every entry of `snapshot` that is `base_dn` or lies below it, in
/// catalog order. An empty `base_dn` matches nothing.
#[must_use]
pub fn subtree_search(snapshot: &Snapshot, base_dn: &str) -> Vec<Entry> {
	snapshot.entries().iter().filter(|entry| entry.is_within(base_dn)).cloned().collect()
}

/// The answer to a SASL mechanism probe: none are supported.
#[must_use]
pub fn sasl_mechanisms_entry() -> Entry {
	Entry { dn: String::new(), attributes: vec![Attribute::new(SASL_MECHANISMS, Vec::<String>::new())] }
}

/// Called by a protocol server to authenticate a client.
#[async_trait]
pub trait BindHandler: Send + Sync {
	/// Authenticate `dn` with `password`.
	async fn bind(&self, dn: &str, password: &str) -> LdapResult;
}

/// Called by a protocol server to answer a search.
#[async_trait]
pub trait SearchHandler: Send + Sync {
	/// Answer `request` for a client bound as `bound_dn`.
	async fn search(&self, bound_dn: &str, request: &SearchRequest) -> SearchResult;
}
