use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    Headers,
    domain::{ACCEPT, ACCEPT_LANGUAGE, X_REQUESTED_WITH},
    error::{ModelError, ModelResult},
};

const BROWSING_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const DEFAULT_ACCEPT_LANGUAGE: &str = "en-us";
const AJAX_REQUESTED_WITH: &str = "XMLHttpRequest";

/// Request-shaping preset chosen by the caller.
///
/// Each directive only fills in conventional headers that are missing:
/// - `None`: nothing is injected.
/// - `Browsing`: `Accept` and `Accept-Language` as a desktop browser would send them.
/// - `Ajax`: `X-Requested-With: XMLHttpRequest` and `Accept-Language`.
///
/// Caller-supplied headers are never overwritten.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandlingDirective {
    #[default]
    None,
    Browsing,
    Ajax,
}

impl HandlingDirective {
    /// Inject this directive's headers into `headers` where absent.
    pub fn apply(&self, headers: &mut Headers) {
        match self {
            HandlingDirective::None => {}
            HandlingDirective::Browsing => {
                headers.set_if_absent(ACCEPT, BROWSING_ACCEPT);
                headers.set_if_absent(ACCEPT_LANGUAGE, DEFAULT_ACCEPT_LANGUAGE);
            }
            HandlingDirective::Ajax => {
                headers.set_if_absent(X_REQUESTED_WITH, AJAX_REQUESTED_WITH);
                headers.set_if_absent(ACCEPT_LANGUAGE, DEFAULT_ACCEPT_LANGUAGE);
            }
        }
    }
}

impl FromStr for HandlingDirective {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(HandlingDirective::None),
            "browsing" | "browser" | "html" => Ok(HandlingDirective::Browsing),
            "ajax" | "xhr" => Ok(HandlingDirective::Ajax),
            other => Err(ModelError::UnknownDirective(other.to_string())),
        }
    }
}

impl fmt::Display for HandlingDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlingDirective::None => "none",
            HandlingDirective::Browsing => "browsing",
            HandlingDirective::Ajax => "ajax",
        };
        f.write_str(s)
    }
}
