//! Alert type codes and their message templates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of alert codes accepted by the alerts stream.
///
/// The wire code (`as_code`) is what gets stored in the `alert_type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum AlertType {
    /// Webhook answered with a failure status.
    WebhookStatusFailure,
    /// Webhook could not be reached.
    WebhookConnectionFailure,
    /// Webhook URL returned not found.
    WebhookUrlNotFound,
    /// Webhook rejected our credentials.
    WebhookAuthFailure,
    /// Webhook returned an unusable application payload.
    InvalidAppPayload,
    /// No text-to-speech credentials for the vendor.
    TtsNotProvisioned,
    /// No speech-to-text credentials for the vendor.
    SttNotProvisioned,
    /// Text-to-speech request failed.
    TtsFailure,
    /// Speech-to-text request failed.
    SttFailure,
    /// Outbound call with no carrier configured.
    CarrierNotProvisioned,
    /// Account concurrent call limit reached.
    AccountCallLimit,
    /// Account registered device limit reached.
    AccountDeviceLimit,
    /// Account API rate limit reached.
    AccountApiLimit,
    /// Service provider concurrent call limit reached.
    ServiceProviderCallLimit,
    /// Service provider registered device limit reached.
    ServiceProviderDeviceLimit,
    /// Service provider API rate limit reached.
    ServiceProviderApiLimit,
    /// Account is inactive or suspended.
    AccountInactive,
    /// Playback URL not found.
    PlayFileNotFound,
    /// Streaming TTS endpoint unreachable.
    TtsStreamingConnectionFailure,
    /// Raised by the customer's application.
    Application,
}

impl AlertType {
    /// Every alert type, in declaration order.
    pub const ALL: [Self; 20] = [
        Self::WebhookStatusFailure,
        Self::WebhookConnectionFailure,
        Self::WebhookUrlNotFound,
        Self::WebhookAuthFailure,
        Self::InvalidAppPayload,
        Self::TtsNotProvisioned,
        Self::SttNotProvisioned,
        Self::TtsFailure,
        Self::SttFailure,
        Self::CarrierNotProvisioned,
        Self::AccountCallLimit,
        Self::AccountDeviceLimit,
        Self::AccountApiLimit,
        Self::ServiceProviderCallLimit,
        Self::ServiceProviderDeviceLimit,
        Self::ServiceProviderApiLimit,
        Self::AccountInactive,
        Self::PlayFileNotFound,
        Self::TtsStreamingConnectionFailure,
        Self::Application,
    ];

    /// Stored code for this alert type.
    #[must_use]
    pub const fn as_code(self) -> &'static str {
        match self {
            Self::WebhookStatusFailure => "webhook-failure",
            Self::WebhookConnectionFailure => "webhook-connection-failure",
            Self::WebhookUrlNotFound => "webhook-url-notfound",
            Self::WebhookAuthFailure => "webhook-auth-failure",
            Self::InvalidAppPayload => "invalid-app-payload",
            Self::TtsNotProvisioned => "no-tts",
            Self::SttNotProvisioned => "no-stt",
            Self::TtsFailure => "tts-failure",
            Self::SttFailure => "stt-failure",
            Self::CarrierNotProvisioned => "no-carrier",
            Self::AccountCallLimit => "account-call-limit",
            Self::AccountDeviceLimit => "account-device-limit",
            Self::AccountApiLimit => "account-api-limit",
            Self::ServiceProviderCallLimit => "service-provider-call-limit",
            Self::ServiceProviderDeviceLimit => "service-provider-device-limit",
            Self::ServiceProviderApiLimit => "service-provider-api-limit",
            Self::AccountInactive => "account is inactive or suspended",
            Self::PlayFileNotFound => "play-url-notfound",
            Self::TtsStreamingConnectionFailure => "tts-streaming-connection-failure",
            Self::Application => "alert-from-application",
        }
    }

    /// Look up an alert type by its stored code.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_code() == code)
    }

    /// Render the templated message for this type.
    ///
    /// Types without a template return `None`. Missing context values render
    /// as `unknown`.
    #[must_use]
    pub fn render(self, context: &AlertContext<'_>) -> Option<String> {
        let url = context.url.unwrap_or(UNKNOWN);
        let vendor = context.vendor.unwrap_or(UNKNOWN);
        let count = Placeholder(context.count);
        let status = Placeholder(context.status);

        let message = match self {
            Self::WebhookStatusFailure => format!("{url} returned {status}"),
            Self::WebhookConnectionFailure => format!("failed to connect to {url}"),
            Self::WebhookAuthFailure => format!("authentication failure: {url}"),
            Self::WebhookUrlNotFound => format!("webhook url not found: {url}"),
            Self::InvalidAppPayload => format!("{url} return invalid app payload"),
            Self::TtsNotProvisioned => {
                format!("text to speech credentials for {vendor} have not been provisioned")
            },
            Self::SttNotProvisioned => {
                format!("speech to text credentials for {vendor} have not been provisioned")
            },
            Self::TtsFailure => format!(
                "text to speech request to {vendor} failed; please check your speech credentials"
            ),
            Self::SttFailure => format!(
                "speech to text request to {vendor} failed; please check your speech credentials"
            ),
            Self::CarrierNotProvisioned => {
                "outbound call failure: no carriers have been provisioned".to_owned()
            },
            Self::AccountCallLimit => format!(
                "you have exceeded your account call limit of {count}; please consider upgrading your plan"
            ),
            Self::AccountDeviceLimit => format!(
                "you have exceeded your account limit of {count} registered devices; please consider upgrading your plan"
            ),
            Self::AccountApiLimit => format!(
                "you have exceeded your account api limit of {count}; please consider upgrading your plan"
            ),
            Self::ServiceProviderCallLimit => format!(
                "you have exceeded your service provider call limit of {count}; please consider upgrading your plan"
            ),
            Self::ServiceProviderDeviceLimit => format!(
                "you have exceeded your service provider limit of {count} registered devices; please consider upgrading your plan"
            ),
            Self::ServiceProviderApiLimit => format!(
                "you have exceeded your service provider api limit of {count}; please consider upgrading your plan"
            ),
            Self::PlayFileNotFound => format!("The file at {url} was not found"),
            Self::TtsStreamingConnectionFailure => {
                format!("Failed to connect to tts streaming service at {vendor}")
            },
            Self::AccountInactive | Self::Application => return None,
        };
        Some(message)
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_code())
    }
}

impl TryFrom<String> for AlertType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown alert type `{value}`"))
    }
}

impl From<AlertType> for &'static str {
    fn from(value: AlertType) -> Self {
        value.as_code()
    }
}

const UNKNOWN: &str = "unknown";

struct Placeholder(Option<i64>);

impl fmt::Display for Placeholder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => value.fmt(formatter),
            None => formatter.write_str(UNKNOWN),
        }
    }
}

/// Contextual values consumed by alert templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertContext<'a> {
    /// Webhook or media URL.
    pub url: Option<&'a str>,
    /// HTTP status returned by a webhook.
    pub status: Option<i64>,
    /// Speech vendor.
    pub vendor: Option<&'a str>,
    /// Limit value that was exceeded.
    pub count: Option<i64>,
    /// Entity the alert is about.
    pub target_sid: Option<&'a str>,
}

/// Resolve the message stored for an alert.
///
/// A non-empty explicit message always wins. Otherwise the template for a
/// known code is used; unknown codes and untemplated types yield `None`.
#[must_use]
pub fn format_alert_message(
    alert_type: &str,
    explicit: Option<&str>,
    context: &AlertContext<'_>,
) -> Option<String> {
    if let Some(message) = explicit.filter(|message| !message.is_empty()) {
        return Some(message.to_owned());
    }
    AlertType::parse(alert_type).and_then(|kind| kind.render(context))
}
