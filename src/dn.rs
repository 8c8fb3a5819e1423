//! Construction of distinguished names.
//!
//! Names are composed without escaping. An identifier containing `,` or `=`
//! yields an ambiguous name; upstream email addresses practically never do.

use std::fmt;

/// Attribute tag used for the components of the base suffix.
pub const DOMAIN_COMPONENT: &str = "dc";

/// The container an entry lives in below the base suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
	/// `cn=users`
	Users,
	/// `cn=groups`
	Groups,
}

impl Category {
	/// The container name as it appears in a distinguished name.
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Category::Users => "users",
			Category::Groups => "groups",
		}
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Turn a dotted domain name into a naming suffix, tagging every label with
/// `tag`, e.g. `example.com` becomes `dc=example,dc=com`.
///
/// An empty domain yields an empty suffix.
#[must_use]
pub fn domain_to_suffix(domain: &str, tag: &str) -> String {
	if domain.is_empty() {
		return String::new();
	}
	domain.split('.').map(|label| format!("{tag}={label}")).collect::<Vec<_>>().join(",")
}

/// Compose the distinguished name `cn=<id>,cn=<category>,<suffix>`. `id`
/// must not be empty.
#[must_use]
pub fn build_dn(id: &str, category: Category, suffix: &str) -> String {
	format!("cn={id},cn={category},{suffix}")
}
