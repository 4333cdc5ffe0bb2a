use crate::UrlError;
use url::Url;

/// Prefix of an unmaterialised JavaScript handle rendered as text
const HANDLE_REFERENCE_PREFIX: &str = "JSHandle@";

/// Reasons an href is skipped without being treated as an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HrefRejection {
    /// Attribute missing, empty, or whitespace only
    Empty,
    /// Same-page `#` anchor
    FragmentOnly,
    /// `javascript:` pseudo-protocol
    JavaScript,
    /// A handle reference instead of a real attribute value
    HandleReference,
}

impl HrefRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::FragmentOnly => "fragment-only",
            Self::JavaScript => "javascript",
            Self::HandleReference => "handle-reference",
        }
    }
}

/// Checks whether a raw href attribute points somewhere worth saving
///
/// # Rejected values
///
/// - missing, empty, or whitespace-only attributes
/// - the literal `#`
/// - `javascript:` pseudo-protocol links
/// - handle-reference strings (`JSHandle@...`) that were never materialised
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::{check_href, HrefRejection};
///
/// assert_eq!(check_href(Some("/detail/123")), Ok("/detail/123"));
/// assert_eq!(check_href(Some("#")), Err(HrefRejection::FragmentOnly));
/// ```
pub fn check_href(href: Option<&str>) -> Result<&str, HrefRejection> {
    let href = href.ok_or(HrefRejection::Empty)?;

    if href.starts_with(HANDLE_REFERENCE_PREFIX) {
        return Err(HrefRejection::HandleReference);
    }

    let trimmed = href.trim();
    if trimmed.is_empty() {
        return Err(HrefRejection::Empty);
    }

    if trimmed == "#" {
        return Err(HrefRejection::FragmentOnly);
    }

    if trimmed
        .get(..11)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("javascript:"))
    {
        return Err(HrefRejection::JavaScript);
    }

    Ok(trimmed)
}

/// Resolves an href against the address of the page it was found on
///
/// Relative and protocol-relative hrefs are joined onto `base`; absolute hrefs
/// are returned as parsed.
///
/// # Arguments
///
/// * `base` - Address of the page the link was found on
/// * `href` - The raw href value
///
/// # Returns
///
/// * `Ok(String)` - The fully-qualified URL
/// * `Err(UrlError)` - The base or the joined URL could not be parsed
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::resolve_href;
///
/// let url = resolve_href("https://example.com", "/detail/123").unwrap();
/// assert_eq!(url, "https://example.com/detail/123");
/// ```
pub fn resolve_href(base: &str, href: &str) -> Result<String, UrlError> {
    let base = Url::parse(base).map_err(|e| UrlError::Parse(format!("{}: {}", base, e)))?;
    resolve_href_with(&base, href)
}

/// Same as `resolve_href` with an already parsed base
pub fn resolve_href_with(base: &Url, href: &str) -> Result<String, UrlError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(UrlError::UnusableHref(href.to_string()));
    }

    let joined = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    Ok(joined.to_string())
}
