//! Error type shared by the fairgate crates.

pub type FgResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	/// Configuration value is present but unusable (fatal at startup)
	Config(String),
	/// Input could not be parsed
	Parse(String),

	// externals
	Io(std::io::Error),
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		Self::Io(err)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Error::Config(msg) => write!(f, "configuration error: {}", msg),
			Error::Parse(msg) => write!(f, "parse error: {}", msg),
			Error::Io(err) => write!(f, "io error: {}", err),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Error::Io(err) => Some(err),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display() {
		let err = Error::Config("time: cannot parse \"soon\"".into());
		assert_eq!(err.to_string(), "configuration error: time: cannot parse \"soon\"");
	}

	#[test]
	fn test_io_source() {
		let err: Error = std::io::Error::other("boom").into();
		assert!(std::error::Error::source(&err).is_some());
		assert!(std::error::Error::source(&Error::Parse("x".into())).is_none());
	}
}

// vim: ts=4
