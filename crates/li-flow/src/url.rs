//! Authorization URL construction and callback URL parsing

use std::collections::HashMap;

use li_types::{CallbackResult, FlowError, FlowResult};

/// Fixed authorization base path of the identity provider.
pub const AUTHORIZATION_URL: &str = "https://www.linkedin.com/oauth/v2/authorization";

/// Default OAuth scope requested when the caller specifies none.
pub const DEFAULT_SCOPE: &str = "r_emailaddress";

/// Build the authorization URL for one attempt.
///
/// Pure string construction, no network call. The redirect URI, scope, and
/// state are percent-encoded; the response type is always `code`.
pub fn build_authorization_url(
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
    state: &str,
) -> String {
    format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        AUTHORIZATION_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(scope),
        urlencoding::encode(state),
    )
}

/// Parse URL query parameters into a map.
///
/// Accepts a full URL, a search string with a leading `?`, or a bare query.
/// Pairs without a `=` are skipped; malformed percent-encoding fails with
/// `url_parse_error`.
pub fn parse_query(input: &str) -> FlowResult<HashMap<String, String>> {
    let query = match input.find('?') {
        Some(idx) => &input[idx + 1..],
        None => input,
    };

    let mut parsed = HashMap::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let key = urlencoding::decode(key)
            .map_err(|e| FlowError::UrlParse(format!("invalid key encoding: {e}")))?;
        let value = urlencoding::decode(value)
            .map_err(|e| FlowError::UrlParse(format!("invalid value encoding: {e}")))?;
        parsed.insert(key.into_owned(), value.into_owned());
    }

    Ok(parsed)
}

/// Parse the identity provider's redirect URL into a callback result.
///
/// An input carrying no recognizable query at all is rejected as malformed;
/// a missing state decodes to the empty string and fails CSRF validation
/// downstream.
pub fn parse_callback_result(url: &str) -> FlowResult<CallbackResult> {
    let params = parse_query(url)?;
    if params.is_empty() {
        return Err(FlowError::UrlParse(format!(
            "no query parameters in callback URL: {url}"
        )));
    }

    Ok(CallbackResult {
        code: params.get("code").cloned(),
        error: params.get("error").cloned(),
        error_description: params.get("error_description").cloned(),
        state: params.get("state").cloned().unwrap_or_default(),
    })
}
