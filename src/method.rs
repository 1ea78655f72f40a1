//! HTTP methods as route keys.
//!
//! A route is registered for a [`MethodSpec`]: either one of the RFC 9110
//! verbs ([`Method`]) or an arbitrary extension token such as `PURGE` or
//! `VOROJBA`. Both kinds are matched the same way, by exact comparison of
//! the wire token. There is no prefix matching and no case folding
//! (method tokens are case-sensitive per RFC 9110 §9.1).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// An RFC 9110 method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── MethodSpec ────────────────────────────────────────────────────────────────

/// The method half of a route key.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MethodSpec {
    Standard(Method),
    Extension(Box<str>),
}

impl MethodSpec {
    /// Parses a raw method token.
    ///
    /// Standard verbs map to [`MethodSpec::Standard`], anything else that is
    /// a syntactically valid token becomes an [`MethodSpec::Extension`].
    /// Tokens of any length are accepted.
    pub fn parse(token: &str) -> Result<Self, Error> {
        if let Ok(method) = token.parse::<Method>() {
            return Ok(Self::Standard(method));
        }
        // `http` applies the RFC 9110 `tchar` grammar for us.
        http::Method::from_bytes(token.as_bytes())
            .map_err(|_| Error::InvalidMethod(token.to_owned()))?;
        Ok(Self::Extension(token.into()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Standard(method) => method.as_str(),
            Self::Extension(token) => token,
        }
    }

    /// Exact token comparison against an incoming request method.
    pub fn matches(&self, method: &http::Method) -> bool {
        self.as_str() == method.as_str()
    }
}

impl From<Method> for MethodSpec {
    fn from(method: Method) -> Self {
        Self::Standard(method)
    }
}

impl fmt::Display for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_verbs_parse_to_standard() {
        assert_eq!(MethodSpec::parse("GET").unwrap(), MethodSpec::Standard(Method::Get));
        assert_eq!(MethodSpec::parse("OPTIONS").unwrap(), MethodSpec::Standard(Method::Options));
    }

    #[test]
    fn lowercase_verb_is_an_extension() {
        let spec = MethodSpec::parse("get").unwrap();
        assert_eq!(spec, MethodSpec::Extension("get".into()));
        assert!(!spec.matches(&http::Method::GET));
    }

    #[test]
    fn long_extension_tokens_are_kept_whole() {
        let token = "ONE_HELL_LONG_VOROJBA_EXTENSION";
        let spec = MethodSpec::parse(token).unwrap();
        assert_eq!(spec.as_str(), token);

        let method = http::Method::from_bytes(token.as_bytes()).unwrap();
        assert!(spec.matches(&method));
    }

    #[test]
    fn extension_tokens_do_not_match_by_prefix() {
        let short = MethodSpec::parse("VOROJBA").unwrap();
        let long = http::Method::from_bytes(b"VOROJBA_EXTENSION").unwrap();
        assert!(!short.matches(&long));
    }

    #[test]
    fn invalid_tokens_are_rejected() {
        assert!(matches!(MethodSpec::parse("BAD METHOD"), Err(Error::InvalidMethod(_))));
        assert!(MethodSpec::parse("").is_err());
    }
}
