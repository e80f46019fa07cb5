use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::fmt;
use thiserror::Error;
use url::Url;

/// Categories a post can be filed under. Order is the order shown to users.
pub const KNOWN_CATEGORIES: &[&str] = &[
    "Scienza e Tecnologia",
    "Storia",
    "Natura e Ambiente",
    "Spazio e Astronomia",
    "Arte e Cultura",
    "Geografia",
    "Biografie",
    "Altro",
];

/// Fallback for generated posts whose category is not recognised.
pub const FALLBACK_CATEGORY: &str = "Altro";

/// Library heading for posts without any category.
pub const UNCATEGORIZED_LABEL: &str = "Generale";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("URL cannot be empty")]
    EmptyUrl,
    #[error("Malformed URL: {0}")]
    MalformedUrl(String),
    #[error("URL must have a host")]
    MissingHost,
    #[error("Local addresses not allowed: {0}")]
    LocalAddress(String),
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheme::Http => write!(f, "http"),
            Scheme::Https => write!(f, "https"),
        }
    }
}

/// A public web link (article source or image).
/// Guarantees: HTTP/HTTPS scheme, non-empty non-local host, no fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct PublicUrl {
    pub scheme: Scheme,

    /// lowercased
    pub host: String,

    /// only non-default ports
    pub port: Option<u16>,

    /// no trailing slash except root
    pub path: String,

    pub query: Option<BTreeMap<String, String>>,
}

impl fmt::Display for PublicUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        write!(f, "{}", self.path)?;

        if let Some(params) = self.query.as_ref().filter(|q| !q.is_empty()) {
            let mut serializer = url::form_urlencoded::Serializer::new(String::new());
            for (key, value) in params {
                serializer.append_pair(key, value);
            }
            write!(f, "?{}", serializer.finish())?;
        }

        Ok(())
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost"
        || host.starts_with("127.")
        || host.starts_with("192.168.")
        || host.starts_with("10.")
}

impl TryFrom<Url> for PublicUrl {
    type Error = ValidationError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ValidationError::MissingHost)?
            .to_lowercase();
        if is_local_host(&host) {
            return Err(ValidationError::LocalAddress(host));
        }

        let port = url.port().filter(|&p| p != scheme.default_port());

        let path = match url.path() {
            "" | "/" => "/".to_string(),
            p => p.strip_suffix('/').unwrap_or(p).to_string(),
        };

        let query: BTreeMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(PublicUrl {
            scheme,
            host,
            port,
            path,
            query: (!query.is_empty()).then_some(query),
        })
    }
}

pub fn validate_url(url_str: &str) -> Result<PublicUrl, ValidationError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let url = Url::parse(trimmed).map_err(|_| ValidationError::MalformedUrl(trimmed.to_string()))?;
    PublicUrl::try_from(url)
}

/// Canonical form of a link, or the input unchanged when it cannot be parsed.
/// Links on generated content are optional data and never fail a request.
pub fn normalize_url_lenient(url_str: &str) -> String {
    match validate_url(url_str) {
        Ok(url) => url.to_string(),
        Err(_) => url_str.to_string(),
    }
}

pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// Matches a category name case-insensitively against [`KNOWN_CATEGORIES`].
pub fn validate_category(name: &str) -> Result<&'static str, ValidationError> {
    let trimmed = name.trim();
    KNOWN_CATEGORIES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(trimmed))
        .ok_or_else(|| ValidationError::UnknownCategory(trimmed.to_string()))
}

/// Category for content coming from the generator: known names are kept,
/// anything else is filed under [`FALLBACK_CATEGORY`].
pub fn classify_category(name: Option<&str>) -> Option<String> {
    let name = name.map(str::trim).filter(|n| !n.is_empty())?;
    Some(
        validate_category(name)
            .unwrap_or(FALLBACK_CATEGORY)
            .to_string(),
    )
}

/// Validates a user's preferred categories, dropping duplicates but keeping order.
pub fn validate_preferred_categories(names: &[String]) -> Result<Vec<String>, ValidationError> {
    let mut result: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let known = validate_category(name)?;
        if !result.iter().any(|c| c == known) {
            result.push(known.to_string());
        }
    }
    Ok(result)
}
