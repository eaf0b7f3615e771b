//! Google Calendar out-of-office events.
//!
//! Authenticates as a service account: a short-lived RS256 JWT is exchanged
//! for an OAuth access token, which is cached until shortly before expiry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CalendarConfig;
use crate::error::{Result, YuriError};

use super::{CalendarEvent, CalendarService};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
/// Refresh the access token this long before Google says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The fields of a service-account key file that matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Parse a key given as raw JSON or as base64-encoded JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let json_text = if raw.starts_with('{') {
            raw.to_string()
        } else {
            let decoded = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map_err(|e| YuriError::Config(format!("Invalid base64 credentials: {}", e)))?;
            String::from_utf8(decoded)
                .map_err(|e| YuriError::Config(format!("Credentials are not UTF-8: {}", e)))?
        };
        serde_json::from_str(&json_text)
            .map_err(|e| YuriError::Config(format!("Invalid service account JSON: {}", e)))
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Calendar client authenticated as a service account.
pub struct GoogleCalendar {
    client: Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    calendar_id: String,
    token: Mutex<Option<(String, Instant)>>,
}

impl GoogleCalendar {
    pub fn new(key: ServiceAccountKey, calendar_id: &str) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| YuriError::Config(format!("Invalid service account private key: {}", e)))?;
        Ok(Self {
            client: Client::new(),
            key,
            encoding_key,
            calendar_id: calendar_id.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Build a client from the `calendar` config section.
    pub fn from_config(config: &CalendarConfig) -> Result<Self> {
        let raw = config
            .service_account_json
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| YuriError::Config("GOOGLE_SERVICE_ACCOUNT_JSON not configured".into()))?;
        let calendar_id = config
            .calendar_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| YuriError::Config("GOOGLE_CALENDAR_ID not configured".into()))?;
        Self::new(ServiceAccountKey::parse(raw)?, calendar_id)
    }

    fn signed_assertion(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: CALENDAR_SCOPE,
            aud: self.key.token_uri(),
            iat,
            exp: iat + 3600,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| YuriError::Calendar(format!("Failed to sign JWT: {}", e)))
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some((token, expires_at)) = cached.as_ref() {
            if Instant::now() < *expires_at {
                return Ok(token.clone());
            }
        }

        let assertion = self.signed_assertion()?;
        let response = self
            .client
            .post(self.key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| YuriError::Calendar(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YuriError::Calendar(format!(
                "Token exchange error {}: {}",
                status, body
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| YuriError::Calendar(format!("Invalid token response: {}", e)))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some((token.access_token.clone(), Instant::now() + lifetime));
        Ok(token.access_token)
    }

    fn events_url(&self) -> Result<Url> {
        let mut url = Url::parse(CALENDAR_API_BASE)
            .map_err(|e| YuriError::Calendar(format!("Invalid calendar URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| YuriError::Calendar("Calendar URL cannot be a base".into()))?
            .push(&self.calendar_id)
            .push("events");
        Ok(url)
    }
}

/// Request body for an all-day, non-blocking out-of-office event.
///
/// All-day events use an exclusive end date, so someone out Feb 20-21 gets
/// an event ending Feb 22.
pub fn out_of_office_event(user_name: &str, first: NaiveDate, last: NaiveDate) -> Value {
    let end = last.succ_opt().unwrap_or(last);
    json!({
        "summary": format!("{} - Out of Office", user_name),
        "eventType": "default",
        "start": { "date": first.format("%Y-%m-%d").to_string() },
        "end": { "date": end.format("%Y-%m-%d").to_string() },
        "transparency": "transparent",
    })
}

#[async_trait]
impl CalendarService for GoogleCalendar {
    async fn create_out_of_office(
        &self,
        user_name: &str,
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<CalendarEvent> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(token)
            .json(&out_of_office_event(user_name, first, last))
            .send()
            .await
            .map_err(|e| YuriError::Calendar(format!("Event request failed: {}", e)))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| YuriError::Calendar(format!("Invalid event response: {}", e)))?;
        if !status.is_success() {
            return Err(YuriError::Calendar(format!(
                "Calendar API error {}: {}",
                status, body
            )));
        }

        let event = CalendarEvent {
            id: body.get("id").and_then(Value::as_str).map(str::to_string),
            link: body
                .get("htmlLink")
                .and_then(Value::as_str)
                .map(str::to_string),
        };
        info!(link = ?event.link, "Calendar event created");
        Ok(event)
    }
}

/// Stand-in used when no calendar is configured; every call fails so the
/// time-off tool reports `calendar_event_created: false`.
#[derive(Debug, Default)]
pub struct UnconfiguredCalendar;

#[async_trait]
impl CalendarService for UnconfiguredCalendar {
    async fn create_out_of_office(
        &self,
        _user_name: &str,
        _first: NaiveDate,
        _last: NaiveDate,
    ) -> Result<CalendarEvent> {
        Err(YuriError::Calendar(
            "Google Calendar not configured".to_string(),
        ))
    }
}

/// Pick the calendar implementation for this deployment.
pub fn calendar_from_config(config: &CalendarConfig) -> Arc<dyn CalendarService> {
    if !config.is_configured() {
        warn!("Google Calendar not configured, out-of-office events will be skipped");
        return Arc::new(UnconfiguredCalendar);
    }
    match GoogleCalendar::from_config(config) {
        Ok(calendar) => {
            info!("Connected to Google Calendar");
            Arc::new(calendar)
        }
        Err(e) => {
            warn!(error = %e, "Failed to initialize Google Calendar");
            Arc::new(UnconfiguredCalendar)
        }
    }
}
