use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::VerifyConfig;
use crate::error::ApiError;

/// Handle to an in-flight phone verification. The service hands this back to
/// the caller; no verification state is kept server-side, the client echoes
/// it on the confirm step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpSession {
    pub checks_url: String,
    pub session_id: String,
}

/// SMS verification provider. `start_session` covers the whole
/// provision-and-send handshake; `confirm_session` reports whether the
/// provider approved the submitted code.
#[async_trait]
pub trait PhoneVerifier: Send + Sync {
    async fn start_session(&self, phone: &str) -> Result<OtpSession, ApiError>;
    async fn confirm_session(
        &self,
        session_id: &str,
        code: &str,
        checks_url: &str,
    ) -> Result<bool, ApiError>;
}

/// Deliverability check for email addresses, backed by an external
/// verification API. A judged-undeliverable address is an invalid parameter.
#[async_trait]
pub trait EmailChecker: Send + Sync {
    async fn check_deliverable(&self, email: &str) -> Result<(), ApiError>;
}

const TWILIO_SERVICES_URL: &str = "https://verify.twilio.com/v2/Services";

/// Twilio Verify client. Both operations are strictly sequential round
/// trips; any transport, body-read or decode failure keeps its own error
/// kind so callers can tell them apart.
pub struct TwilioVerify {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl TwilioVerify {
    pub fn new(cfg: VerifyConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            account_sid: cfg.account_sid,
            auth_token: cfg.auth_token,
        }
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<bytes::Bytes, ApiError> {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                service: "twilio",
                source: e,
            })?;

        response.bytes().await.map_err(|e| ApiError::BodyRead {
            service: "twilio",
            source: e,
        })
    }
}

#[derive(Deserialize)]
struct ServiceLinks {
    verifications: String,
    verification_checks: String,
}

#[derive(Deserialize)]
struct ServiceResponse {
    links: ServiceLinks,
}

#[derive(Deserialize)]
struct VerificationStarted {
    sid: String,
}

#[derive(Deserialize)]
struct VerificationCheck {
    status: Option<serde_json::Value>,
}

#[async_trait]
impl PhoneVerifier for TwilioVerify {
    async fn start_session(&self, phone: &str) -> Result<OtpSession, ApiError> {
        // First call provisions a verification service; its response carries
        // the URLs for the two follow-up operations.
        let body = self
            .post_form(
                TWILIO_SERVICES_URL,
                &[("FriendlyName", "shutterlog phone verification")],
            )
            .await?;
        let service: ServiceResponse =
            serde_json::from_slice(&body).map_err(|e| ApiError::Unmarshal {
                service: "twilio",
                source: e,
            })?;

        // Second call asks that service to deliver the code over SMS. It must
        // not start before the first completes: its target URL comes from the
        // first response.
        let body = self
            .post_form(
                &service.links.verifications,
                &[("To", phone), ("Channel", "sms")],
            )
            .await?;
        let started: VerificationStarted =
            serde_json::from_slice(&body).map_err(|e| ApiError::Unmarshal {
                service: "twilio",
                source: e,
            })?;

        debug!(session_id = %started.sid, "verification session started");
        Ok(OtpSession {
            checks_url: service.links.verification_checks,
            session_id: started.sid,
        })
    }

    async fn confirm_session(
        &self,
        session_id: &str,
        code: &str,
        checks_url: &str,
    ) -> Result<bool, ApiError> {
        let body = self
            .post_form(checks_url, &[("Code", code), ("VerificationSid", session_id)])
            .await?;
        let check: VerificationCheck =
            serde_json::from_slice(&body).map_err(|e| ApiError::Unmarshal {
                service: "twilio",
                source: e,
            })?;

        // Only the literal status "approved" counts; an absent or non-string
        // status is a rejection, not an error.
        let approved = matches!(
            check.status.as_ref().and_then(|v| v.as_str()),
            Some("approved")
        );
        Ok(approved)
    }
}

const REALMAIL_URL: &str = "https://isitarealemail.com/api/email/validate";

/// Client for the real-email deliverability API.
pub struct RealEmailCheck {
    http: reqwest::Client,
    api_key: String,
}

impl RealEmailCheck {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct RealEmailResponse {
    status: Option<String>,
}

#[async_trait]
impl EmailChecker for RealEmailCheck {
    async fn check_deliverable(&self, email: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .get(REALMAIL_URL)
            .query(&[("email", email)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                service: "realmail",
                source: e,
            })?;

        let body = response.bytes().await.map_err(|e| ApiError::BodyRead {
            service: "realmail",
            source: e,
        })?;

        let verdict: RealEmailResponse =
            serde_json::from_slice(&body).map_err(|e| ApiError::Unmarshal {
                service: "realmail",
                source: e,
            })?;

        match verdict.status.as_deref() {
            Some("valid") => Ok(()),
            _ => Err(ApiError::InvalidParam("email")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_status_parses_only_string_approved() {
        let approved: VerificationCheck =
            serde_json::from_str(r#"{"status": "approved"}"#).unwrap();
        assert_eq!(
            approved.status.as_ref().and_then(|v| v.as_str()),
            Some("approved")
        );

        // Non-string and absent statuses must not read as approved.
        let numeric: VerificationCheck = serde_json::from_str(r#"{"status": 200}"#).unwrap();
        assert_eq!(numeric.status.as_ref().and_then(|v| v.as_str()), None);

        let missing: VerificationCheck = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.status.is_none());
    }

    #[test]
    fn service_response_reads_both_links() {
        let raw = r#"{
            "sid": "VA1234",
            "links": {
                "verifications": "https://verify.twilio.com/v2/Services/VA1234/Verifications",
                "verification_checks": "https://verify.twilio.com/v2/Services/VA1234/VerificationCheck"
            }
        }"#;
        let parsed: ServiceResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.links.verifications.ends_with("/Verifications"));
        assert!(parsed.links.verification_checks.ends_with("/VerificationCheck"));
    }
}
