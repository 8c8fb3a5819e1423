//! Serve the user and group catalog of an identity provider as a read-only
//! LDAP directory.
//!
//! The library periodically fetches every user and group (with its members)
//! from an upstream [`DirectorySource`], turns each record into an [`Entry`]
//! placed under the naming suffix derived from the configured domain, and
//! publishes the result as an immutable [`Snapshot`]. Searches are answered
//! from whichever snapshot is current when they arrive; a refresh replaces the
//! snapshot in one step, so a search never sees a mix of two generations.
//!
//! The directory tree looks like this for the domain `example.com`:
//!
//! ```text
//! dc=example,dc=com
//! ├── cn=users
//! │   └── cn=alice@example.com
//! └── cn=groups
//!     └── cn=staff@example.com   (member: cn=alice@example.com,cn=users,...)
//! ```
//!
//! # Getting started
//! The protocol server itself is not part of this library. It calls into a
//! [`Directory`] through the [`BindHandler`] and [`SearchHandler`] traits:
//! ```no_run
//! # async fn run(source: std::sync::Arc<dyn workspace_ldap::DirectorySource>)
//! # -> Result<(), Box<dyn std::error::Error>> {
//! use tokio_util::sync::CancellationToken;
//! use workspace_ldap::{Config, Directory, SearchHandler, SearchRequest};
//!
//! // Configuration can also be deserialized with serde. It's hand-constructed
//! // here for demonstration purposes.
//! let config = Config { domain: "example.com".to_owned(), ..Config::default() };
//!
//! // Loads the catalog once; an error here means nothing can be served.
//! let directory = Directory::connect(config, source).await?;
//! let shutdown = CancellationToken::new();
//! let _refresher = directory.spawn_refresher(shutdown.clone());
//!
//! let result = directory.search("", &SearchRequest::subtree("cn=users,dc=example,dc=com")).await;
//! for entry in result.entries {
//!     println!("{}", entry.dn);
//! }
//! shutdown.cancel();
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Every bind succeeds, whatever the credentials. Access has to be
//!   restricted at the network level.
//! * Distinguished names are not escaped. Addresses containing `,` or `=`
//!   produce ambiguous names.
//! * Search filters and scopes are not evaluated. Every search returns the
//!   whole subtree below its base.
//! * Each refresh fetches the complete catalog; there are no incremental
//!   updates.

mod cache;
pub mod config;
pub mod directory;
pub mod dn;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod search;
pub mod source;

pub use ldap3::{self, LdapResult, Scope, SearchEntry};

pub use crate::{
	cache::{Snapshot, SnapshotCache},
	config::Config,
	directory::{Directory, Stats},
	entry::{Attribute, Entry, EntryExt},
	error::Error,
	search::{BindHandler, SearchHandler, SearchRequest, SearchResult},
	source::{DirectorySource, Group, Member, Page, SourceError, User, UserName},
};
