//! Directory entries and their construction from upstream records.
use ldap3::SearchEntry;
use serde::Serialize;

use crate::{
	dn::{build_dn, Category},
	error::Error,
	source::{Group, User},
};

/// A single directory object.
///
/// Cloning an entry copies every attribute value, so a clone handed to a
/// caller shares nothing with the cached original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
	/// The distinguished name, unique within a snapshot.
	pub dn: String,
	/// Attributes in insertion order. Names are unique within an entry.
	pub attributes: Vec<Attribute>,
}

/// A named, multi-valued attribute of an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
	/// Attribute name.
	pub name: String,
	/// Attribute values in insertion order.
	pub values: Vec<String>,
}

impl Attribute {
	/// Create an attribute from a name and its values.
	#[must_use]
	pub fn new<V>(name: &str, values: V) -> Self
	where
		V: IntoIterator,
		V::Item: Into<String>,
	{
		Self { name: name.to_owned(), values: values.into_iter().map(Into::into).collect() }
	}
}

impl Entry {
	/// Build the entry for a user, named after its primary address.
	#[must_use]
	pub fn from_user(user: &User, suffix: &str) -> Self {
		tracing::trace!(primary_email = %user.primary_email, id = %user.id, "Converting user");
		let mail = std::iter::once(&user.primary_email).chain(&user.aliases).cloned();
		Self {
			dn: build_dn(&user.primary_email, Category::Users, suffix),
			attributes: vec![
				Attribute::new("objectclass", ["user"]),
				Attribute::new("cn", [user.primary_email.as_str()]),
				Attribute::new("givenname", [user.name.given_name.as_str()]),
				Attribute::new("surname", [user.name.family_name.as_str()]),
				Attribute::new("mail", mail),
				Attribute::new("uid", [user.id.as_str()]),
				Attribute::new("has2Fa", [bool_str(user.enrolled_in_2fa)]),
				Attribute::new("archived", [bool_str(user.archived)]),
				Attribute::new("suspended", [bool_str(user.suspended)]),
			],
		}
	}

	/// Build the entry for a group. `member_emails` are the addresses of the
	/// group's members, each of which is referenced by its user entry name.
	#[must_use]
	pub fn from_group<'a, I>(group: &Group, member_emails: I, suffix: &str) -> Self
	where
		I: IntoIterator<Item = &'a str>,
	{
		tracing::trace!(email = %group.email, id = %group.id, "Converting group");
		let mail = std::iter::once(&group.email).chain(&group.aliases).cloned();
		let members = member_emails.into_iter().map(|email| build_dn(email, Category::Users, suffix));
		Self {
			dn: build_dn(&group.email, Category::Groups, suffix),
			attributes: vec![
				Attribute::new("objectclass", ["group"]),
				Attribute::new("cn", [group.email.as_str()]),
				Attribute::new("mail", mail),
				Attribute::new("uid", [group.id.as_str()]),
				Attribute::new("member", members),
			],
		}
	}

	/// Whether this entry is `base_dn` itself or lies anywhere below it.
	#[must_use]
	pub fn is_within(&self, base_dn: &str) -> bool {
		if base_dn.is_empty() {
			return false;
		}
		self.dn == base_dn
			|| self
				.dn
				.strip_suffix(base_dn)
				.is_some_and(|rest| rest.ends_with(','))
	}
}

/// Render a flag the way it is stored in attribute values.
fn bool_str(value: bool) -> &'static str {
	if value {
		"true"
	} else {
		"false"
	}
}

impl From<Entry> for SearchEntry {
	fn from(entry: Entry) -> Self {
		SearchEntry {
			dn: entry.dn,
			attrs: entry.attributes.into_iter().map(|attr| (attr.name, attr.values)).collect(),
			bin_attrs: std::collections::HashMap::new(),
		}
	}
}

/// Convenience methods for reading attribute values out of entries, both our
/// own and those of [`ldap3`].
pub trait EntryExt {
	/// All values of an attribute, or `None` if the entry does not have it.
	fn attr_values(&self, attr: &str) -> Option<&[String]>;

	/// Get the first value of an attribute.
	fn attr_first(&self, attr: &str) -> Option<&str> {
		self.attr_values(attr)?.first().map(String::as_str)
	}

	/// Get the first value of an attribute, interpreted as a boolean.
	fn bool_first(&self, attr: &str) -> Option<Result<bool, Error>> {
		match self.attr_first(attr) {
			Some("true" | "TRUE") => Some(Ok(true)),
			Some("false" | "FALSE") => Some(Ok(false)),
			Some(_) => Some(Err(Error::Invalid(attr.to_owned()))),
			None => None,
		}
	}
}

impl EntryExt for Entry {
	fn attr_values(&self, attr: &str) -> Option<&[String]> {
		self.attributes.iter().find(|a| a.name == attr).map(|a| a.values.as_slice())
	}
}

impl EntryExt for SearchEntry {
	fn attr_values(&self, attr: &str) -> Option<&[String]> {
		self.attrs.get(attr).map(Vec::as_slice)
	}
}
