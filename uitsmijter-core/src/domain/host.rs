//! Host patterns: exact hostnames and single-label wildcards (`*.example.com`).

// self
use crate::_prelude::*;

/// A host a tenant claims, either exact or a single-label wildcard.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HostPattern {
	/// An exact hostname, e.g. `id.example.com`.
	Exact(String),
	/// A single-label wildcard, e.g. `*.example.com`; matches exactly one
	/// label before the suffix — `a.example.com` matches, `a.b.example.com`
	/// does not.
	WildcardOneLabel(String),
}

/// Error returned when a host pattern fails to parse.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum HostPatternError {
	/// The pattern was empty.
	#[error("Host pattern cannot be empty.")]
	Empty,
	/// The pattern contains a wildcard anywhere but the leading label.
	#[error("Wildcard `*` is only supported as the leading label.")]
	WildcardNotLeading,
}

impl HostPattern {
	/// Parses a host pattern, rejecting wildcards anywhere but the leading label.
	pub fn parse(raw: impl AsRef<str>) -> Result<Self, HostPatternError> {
		let raw = raw.as_ref().trim().to_ascii_lowercase();

		if raw.is_empty() {
			return Err(HostPatternError::Empty);
		}
		if raw[1..].contains('*') {
			return Err(HostPatternError::WildcardNotLeading);
		}

		if let Some(suffix) = raw.strip_prefix("*.") {
			Ok(Self::WildcardOneLabel(suffix.to_owned()))
		} else if raw.starts_with('*') {
			Err(HostPatternError::WildcardNotLeading)
		} else {
			Ok(Self::Exact(raw))
		}
	}

	/// Returns whether `host` matches this pattern. Host comparison is
	/// case-insensitive; a wildcard matches exactly one additional label.
	pub fn matches(&self, host: &str) -> bool {
		let host = host.to_ascii_lowercase();

		match self {
			Self::Exact(exact) => *exact == host,
			Self::WildcardOneLabel(suffix) => match host.strip_suffix(suffix.as_str()) {
				Some(prefix) => {
					let Some(label) = prefix.strip_suffix('.') else { return false };

					!label.is_empty() && !label.contains('.')
				},
				None => false,
			},
		}
	}
}

impl TryFrom<String> for HostPattern {
	type Error = HostPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
impl From<HostPattern> for String {
	fn from(value: HostPattern) -> Self {
		match value {
			HostPattern::Exact(h) => h,
			HostPattern::WildcardOneLabel(suffix) => format!("*.{suffix}"),
		}
	}
}
impl Display for HostPattern {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Exact(h) => f.write_str(h),
			Self::WildcardOneLabel(suffix) => write!(f, "*.{suffix}"),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn exact_matches_only_itself() {
		let pattern = HostPattern::parse("id.example.com").expect("exact host should parse");

		assert!(pattern.matches("id.example.com"));
		assert!(pattern.matches("ID.EXAMPLE.COM"), "matching is case-insensitive");
		assert!(!pattern.matches("api.example.com"));
	}

	#[test]
	fn wildcard_matches_exactly_one_label() {
		let pattern = HostPattern::parse("*.example.com").expect("wildcard host should parse");

		assert!(pattern.matches("cookbooks.example.com"));
		assert!(!pattern.matches("example.com"), "the wildcard requires a label, not zero");
		assert!(
			!pattern.matches("a.b.example.com"),
			"multi-label subdomains must not match a single wildcard"
		);
	}

	#[test]
	fn wildcard_must_be_leading() {
		assert!(HostPattern::parse("example.*.com").is_err());
		assert!(HostPattern::parse("*example.com").is_err());
	}

	#[test]
	fn empty_pattern_rejected() {
		assert!(HostPattern::parse("").is_err());
		assert!(HostPattern::parse("   ").is_err());
	}
}
