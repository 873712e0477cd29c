const BLANK_URL: &str = "about:blank";
pub const SUSPENDED_URL_PREFIX: &str = "about:suspended";
pub const ERROR_URL_PREFIX: &str = "about:error";

/// Turns typed input into a loadable URL: empty becomes `about:blank`, bare
/// hosts get an `https://` scheme.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return BLANK_URL.to_owned();
    }
    if trimmed.starts_with("http://")
        || trimmed.starts_with("https://")
        || trimmed.starts_with("about:")
    {
        return trimmed.to_owned();
    }
    format!("https://{trimmed}")
}

/// Internal and placeholder pages never enter history.
pub fn is_recordable(url: &str) -> bool {
    !(url.is_empty()
        || url == BLANK_URL
        || url.starts_with(ERROR_URL_PREFIX)
        || url.starts_with(SUSPENDED_URL_PREFIX))
}
