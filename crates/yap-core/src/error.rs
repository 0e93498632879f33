//! Error kinds for yap, as explicit values rather than exceptions.
//!
//! Every fallible operation in this crate returns `Result<T, YapError>`. The
//! orchestrator treats most variants as per-package failures (log and move
//! on); only `Config` and `Manifest` errors are fatal at startup.

use std::fmt;

/// All error kinds produced by yap-core.
#[derive(Debug, Clone)]
pub enum YapError {
    /// Reading/writing `~/.yap_config` or `.npmrc`; fatal at startup.
    Config { operation: String, detail: String },
    /// `package.json` missing or malformed; fatal at startup.
    Manifest { operation: String, detail: String },
    /// DNS, TCP, TLS, or timeout failures; per-package.
    Network {
        operation: String,
        url: Option<String>,
        detail: String,
    },
    /// Non-200 response from the registry or CDN; per-package.
    HttpStatus {
        operation: String,
        url: Option<String>,
        status: u16,
    },
    /// JSON or binary-codec decode failure.
    Decode { operation: String, detail: String },
    /// URL-prefixed, git-style, or github-shorthand version specs.
    UnsupportedSpec { package: String, spec: String },
    /// No candidate version satisfies the constraint.
    ResolutionFailed { package: String, spec: String },
    /// Gzip or tar stream decoding failure.
    Archive {
        package: String,
        version: String,
        detail: String,
    },
    /// Filesystem errors outside the hardlink-fallback path.
    Filesystem {
        operation: String,
        path: Option<String>,
        detail: String,
    },
}

impl fmt::Display for YapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YapError::Config { operation, detail } => {
                write!(f, "config error in {operation}: {detail}")
            }
            YapError::Manifest { operation, detail } => {
                write!(f, "manifest error in {operation}: {detail}")
            }
            YapError::Network {
                operation,
                url,
                detail,
            } => {
                write!(f, "network error in {operation}: {detail}")?;
                if let Some(u) = url {
                    write!(f, " (url: {u})")?;
                }
                Ok(())
            }
            YapError::HttpStatus {
                operation,
                url,
                status,
            } => {
                write!(f, "http {status} from {operation}")?;
                if let Some(u) = url {
                    write!(f, " (url: {u})")?;
                }
                Ok(())
            }
            YapError::Decode { operation, detail } => {
                write!(f, "decode error in {operation}: {detail}")
            }
            YapError::UnsupportedSpec { package, spec } => {
                write!(f, "unsupported version spec for {package}: {spec}")
            }
            YapError::ResolutionFailed { package, spec } => {
                write!(
                    f,
                    "no version of {package} satisfies constraint {spec}"
                )
            }
            YapError::Archive {
                package,
                version,
                detail,
            } => {
                write!(f, "archive error for {package}@{version}: {detail}")
            }
            YapError::Filesystem {
                operation,
                path,
                detail,
            } => {
                write!(f, "filesystem error in {operation}: {detail}")?;
                if let Some(p) = path {
                    write!(f, " (path: {p})")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for YapError {}

pub type Result<T> = std::result::Result<T, YapError>;

impl YapError {
    pub fn filesystem(operation: &str, path: Option<&str>, source: std::io::Error) -> Self {
        YapError::Filesystem {
            operation: operation.to_string(),
            path: path.map(String::from),
            detail: source.to_string(),
        }
    }

    pub fn network(operation: &str, url: Option<&str>, detail: impl Into<String>) -> Self {
        YapError::Network {
            operation: operation.to_string(),
            url: url.map(String::from),
            detail: detail.into(),
        }
    }

    pub fn decode(operation: &str, detail: impl Into<String>) -> Self {
        YapError::Decode {
            operation: operation.to_string(),
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let e = YapError::HttpStatus {
            operation: "fetch_metadata".to_string(),
            url: Some("https://registry.npmjs.org/lodash".to_string()),
            status: 404,
        };
        let s = e.to_string();
        assert!(s.contains("404"));
        assert!(s.contains("lodash"));
    }

    #[test]
    fn unsupported_spec_names_package_and_spec() {
        let e = YapError::UnsupportedSpec {
            package: "x".to_string(),
            spec: "git+https://example.com/x".to_string(),
        };
        let s = e.to_string();
        assert!(s.contains('x'));
        assert!(s.contains("git+https"));
    }
}
