//! Authorization response parsing

use url::Url;
use url::form_urlencoded;

/// Parameters the provider appends to the redirect URI
const CALLBACK_PARAMS: &[&str] = &[
    "code",
    "state",
    "error",
    "error_description",
    "error_uri",
    "session_state",
    "iss",
];

/// Authorization response found in the current URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthCallback {
    Code {
        code: String,
        state: String,
    },
    Error {
        error: String,
        description: Option<String>,
        state: Option<String>,
    },
}

impl AuthCallback {
    /// Read a callback from the fragment, falling back to the query
    pub fn from_url(url: &Url) -> Option<Self> {
        url.fragment()
            .and_then(Self::parse)
            .or_else(|| url.query().and_then(Self::parse))
    }

    fn parse(input: &str) -> Option<Self> {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in form_urlencoded::parse(input.as_bytes()) {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "state" => state = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => {}
            }
        }

        match (error, code, state) {
            (Some(error), _, state) => Some(Self::Error {
                error,
                description,
                state,
            }),
            (None, Some(code), Some(state)) => Some(Self::Code { code, state }),
            _ => None,
        }
    }

    pub fn state(&self) -> Option<&str> {
        match self {
            Self::Code { state, .. } => Some(state),
            Self::Error { state, .. } => state.as_deref(),
        }
    }
}

/// `url` without any authorization response parameters
pub fn strip_callback_params(url: &Url) -> Url {
    let mut clean = url.clone();

    let query = url.query().map(retain_foreign_params);
    clean.set_query(query.as_deref().filter(|q| !q.is_empty()));

    let fragment = url.fragment().map(retain_foreign_params);
    clean.set_fragment(fragment.as_deref().filter(|f| !f.is_empty()));

    clean
}

fn retain_foreign_params(input: &str) -> String {
    let has_callback_params = form_urlencoded::parse(input.as_bytes())
        .any(|(key, _)| CALLBACK_PARAMS.contains(&key.as_ref()));
    if !has_callback_params {
        return input.to_string();
    }

    let kept = form_urlencoded::parse(input.as_bytes())
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&key.as_ref()))
        .collect::<Vec<_>>();
    if kept.is_empty() {
        return String::new();
    }
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish()
}
