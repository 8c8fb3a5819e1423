//! Config for the directory.
use std::{net::SocketAddr, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
	dn::{domain_to_suffix, DOMAIN_COMPONENT},
	error::Error,
};

/// Default port for the `ldap` scheme.
const LDAP_PORT: u16 = 389;
/// Default port for the `ldaps` scheme.
const LDAPS_PORT: u16 = 636;

/// Directory configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct Config {
	/// The URL the protocol server listens on. Supports ldap and ldaps
	/// schemes
	pub listen: Url,
	/// The domain the directory serves, e.g. `example.com`
	pub domain: String,
	/// Time between refreshes of the catalog. Zero disables refreshing after
	/// the initial load.
	pub refresh_period: Duration,
	/// Maximum number of groups to load, zero for no limit
	pub max_groups: usize,
	/// Account the upstream client acts on behalf of, if any
	pub impersonate: Option<String>,
	/// Deadline for a single refresh, if any
	pub fetch_timeout: Option<Duration>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			listen: default_listen(),
			domain: String::new(),
			refresh_period: Duration::from_secs(30 * 60),
			max_groups: 0,
			impersonate: None,
			fetch_timeout: None,
		}
	}
}

/// Listen on every interface at the standard port.
fn default_listen() -> Url {
	#[allow(clippy::expect_used)]
	Url::parse("ldap://0.0.0.0:389").expect("static URL is valid")
}

impl Config {
	/// The naming suffix of the directory, e.g. `dc=example,dc=com`.
	#[must_use]
	pub fn base_dn(&self) -> String {
		domain_to_suffix(&self.domain, DOMAIN_COMPONENT)
	}

	/// Check that the configuration is usable.
	pub fn validate(&self) -> Result<(), Error> {
		default_port(&self.listen)?;
		if self.listen.host_str().map_or(true, str::is_empty) {
			return Err(Error::Invalid(format!("Listen URL {} has no host", self.listen)));
		}
		if self.fetch_timeout.is_some_and(|timeout| timeout.is_zero()) {
			return Err(Error::Invalid("Fetch timeout must be longer than zero".to_owned()));
		}
		if !self.domain.is_empty() && self.domain.split('.').any(str::is_empty) {
			return Err(Error::Invalid(format!("Domain {:?} has an empty label", self.domain)));
		}
		Ok(())
	}

	/// Resolve the addresses the protocol server should bind to.
	pub fn bind_address(&self) -> Result<Vec<SocketAddr>, Error> {
		let port = default_port(&self.listen)?;
		Ok(self.listen.socket_addrs(|| Some(port))?)
	}
}

/// The port implied by the scheme of `url`.
fn default_port(url: &Url) -> Result<u16, Error> {
	match url.scheme() {
		"ldap" => Ok(LDAP_PORT),
		"ldaps" => Ok(LDAPS_PORT),
		scheme => Err(Error::Invalid(format!("Unsupported listen scheme {scheme:?}"))),
	}
}
