use std::sync::Arc;

use strand_model::{Request, Response};
use tracing::debug;

use crate::error::Error;

/// Check run on every final (non-redirect) response.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, request: &Request, response: &Response) -> Result<(), Error>;
}

/// Run `validators` in order; the first failure wins.
pub fn run_validations(validators: &[Arc<dyn Validator>], request: &Request, response: &Response) -> Result<(), Error> {
    for validator in validators {
        if let Err(err) = validator.validate(request, response) {
            debug!(validator = validator.name(), status = response.status, error = %err, "response rejected");
            return Err(err);
        }
    }
    Ok(())
}

/// Rejects responses outside the 2xx range.
#[derive(Debug, Default)]
pub struct StatusValidator;

impl Validator for StatusValidator {
    fn name(&self) -> &str {
        "status"
    }

    fn validate(&self, _request: &Request, response: &Response) -> Result<(), Error> {
        if response.is_success() {
            return Ok(());
        }
        Err(Error::HttpStatus {
            status: response.status,
            url: response.url.to_string(),
        })
    }
}

/// Detects Cloudflare browser-verification interstitials.
///
/// Matches 403/503 responses served by Cloudflare whose body carries one of the
/// challenge markers.
#[derive(Debug, Default)]
pub struct CloudflareChallengeValidator;

impl CloudflareChallengeValidator {
    const MARKERS: [&'static str; 4] = ["cf-browser-verification", "jschl_vc", "cf_chl_", "challenge-platform"];
}

impl Validator for CloudflareChallengeValidator {
    fn name(&self) -> &str {
        "cloudflare"
    }

    fn validate(&self, _request: &Request, response: &Response) -> Result<(), Error> {
        if !matches!(response.status, 403 | 503) {
            return Ok(());
        }
        let served_by_cloudflare = response
            .header("server")
            .is_some_and(|server| server.to_ascii_lowercase().contains("cloudflare"));
        if !served_by_cloudflare {
            return Ok(());
        }
        let body = String::from_utf8_lossy(&response.body);
        if Self::MARKERS.iter().any(|marker| body.contains(marker)) {
            return Err(Error::CloudflareChallenge {
                url: response.url.to_string(),
            });
        }
        Ok(())
    }
}
