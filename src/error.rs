//! Error codes

use crate::source::SourceError;

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// A configuration or attribute value did not conform to the expected
	/// syntax.
	#[error("Invalid value: {0}")]
	Invalid(String),
	/// An I/O error, e.g. while resolving the listen address.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The upstream identity provider failed while listing users or groups.
	#[error(transparent)]
	Source(#[from] SourceError),
	/// The refresh was cancelled before the catalog was complete.
	#[error("Refresh cancelled")]
	Cancelled,
	/// The refresh did not finish within the configured deadline.
	#[error("Refresh deadline exceeded")]
	Timeout,
}

impl Error {
	/// Whether this error means the refresh ran out of time rather than
	/// failing outright.
	#[must_use]
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout)
	}
}
