use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use tc_common::{parse_boolean_flag, Money, Secret};
use trustchain_engine::{
    fraud::FraudThresholds,
    insurance_objects::InsuranceConfig,
    order_objects::{OrderFlowConfig, DEFAULT_MAX_OTP_ATTEMPTS},
};

const DEFAULT_TC_HOST: &str = "127.0.0.1";
const DEFAULT_TC_PORT: u16 = 8460;
const DEFAULT_MAX_DB_CONNECTIONS: u32 = 25;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;
const DEFAULT_HIGH_VALUE_THRESHOLD: i64 = 50_000;
const DEFAULT_INSURANCE_EXPIRY_INTERVAL: Duration = Duration::from_secs(300);
const DEFAULT_PREMIUM_RATE_PERCENT: f64 = 5.0;
const DEFAULT_SMS_SENDER_ID: &str = "TRUSTCHAIN";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_db_connections: u32,
    /// Capacity of each event bus channel. Events published to a full channel are dropped.
    pub event_buffer_size: usize,
    pub order_flow: OrderFlowConfig,
    pub fraud_thresholds: FraudThresholds,
    pub insurance: InsuranceConfig,
    /// How often the insurance expiry worker runs.
    pub insurance_expiry_interval: Duration,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
    pub mpesa: MpesaConfig,
    pub sms: SmsConfig,
}

#[derive(Clone, Debug, Default)]
pub struct MpesaConfig {
    pub shortcode: String,
    pub passkey: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub sender_id: String,
    pub api_key: Secret<String>,
    /// When false, SMS requests are logged and dropped.
    pub enabled: bool,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self { sender_id: DEFAULT_SMS_SENDER_ID.to_string(), api_key: Secret::default(), enabled: true }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TC_HOST.to_string(),
            port: DEFAULT_TC_PORT,
            database_url: String::default(),
            max_db_connections: DEFAULT_MAX_DB_CONNECTIONS,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            order_flow: OrderFlowConfig::default(),
            fraud_thresholds: FraudThresholds::default(),
            insurance: InsuranceConfig::default(),
            insurance_expiry_interval: DEFAULT_INSURANCE_EXPIRY_INTERVAL,
            use_x_forwarded_for: false,
            use_forwarded: false,
            mpesa: MpesaConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TC_HOST").ok().unwrap_or_else(|| DEFAULT_TC_HOST.into());
        let port = parse_env("TC_PORT", DEFAULT_TC_PORT);
        let database_url = env::var("TC_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TC_DATABASE_URL is not set. Please set it to the URL for the TrustChain database.");
            String::default()
        });
        let max_db_connections = parse_env("TC_MAX_DB_CONNECTIONS", DEFAULT_MAX_DB_CONNECTIONS);
        let event_buffer_size = parse_env("TC_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let max_otp_attempts = match parse_env("TC_MAX_OTP_ATTEMPTS", DEFAULT_MAX_OTP_ATTEMPTS) {
            0 => {
                warn!("🪛️ TC_MAX_OTP_ATTEMPTS must be at least 1. Using {DEFAULT_MAX_OTP_ATTEMPTS}.");
                DEFAULT_MAX_OTP_ATTEMPTS
            },
            n => n,
        };
        let high_value = parse_env("TC_HIGH_VALUE_THRESHOLD", Money::from_units(DEFAULT_HIGH_VALUE_THRESHOLD));
        let fraud_thresholds = FraudThresholds::default().with_high_value_threshold(high_value);
        let insurance_expiry_interval =
            Duration::from_secs(parse_env("TC_INSURANCE_EXPIRY_INTERVAL", DEFAULT_INSURANCE_EXPIRY_INTERVAL.as_secs()));
        let premium_rate = match parse_env("TC_DEFAULT_PREMIUM_RATE", DEFAULT_PREMIUM_RATE_PERCENT) {
            r if r > 0.0 && r <= 100.0 => r,
            r => {
                warn!("🪛️ TC_DEFAULT_PREMIUM_RATE must be in (0, 100], got {r}. Using {DEFAULT_PREMIUM_RATE_PERCENT}.");
                DEFAULT_PREMIUM_RATE_PERCENT
            },
        };
        let insurance = InsuranceConfig::default().with_rate_percent(premium_rate);
        let use_x_forwarded_for = parse_boolean_flag(env::var("TC_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("TC_USE_FORWARDED").ok(), false);
        let mpesa = MpesaConfig::from_env_or_default();
        let sms = SmsConfig::from_env_or_default();
        Self {
            host,
            port,
            database_url,
            max_db_connections,
            event_buffer_size,
            order_flow: OrderFlowConfig { max_otp_attempts },
            fraud_thresholds,
            insurance,
            insurance_expiry_interval,
            use_x_forwarded_for,
            use_forwarded,
            mpesa,
            sms,
        }
    }
}

impl MpesaConfig {
    pub fn from_env_or_default() -> Self {
        let shortcode = env::var("TC_MPESA_SHORTCODE").ok().unwrap_or_else(|| {
            warn!("🪛️ TC_MPESA_SHORTCODE is not set. Payment capture requests will be simulated.");
            String::default()
        });
        let passkey = env::var("TC_MPESA_PASSKEY").ok().unwrap_or_else(|| {
            warn!("🪛️ TC_MPESA_PASSKEY is not set. Payment capture requests will be simulated.");
            String::default()
        });
        Self { shortcode, passkey: Secret::new(passkey) }
    }

    pub fn is_configured(&self) -> bool {
        !self.shortcode.is_empty() && !self.passkey.reveal().is_empty()
    }
}

impl SmsConfig {
    pub fn from_env_or_default() -> Self {
        let sender_id = env::var("TC_SMS_SENDER_ID").ok().unwrap_or_else(|| DEFAULT_SMS_SENDER_ID.into());
        let api_key = env::var("TC_SMS_API_KEY").ok().unwrap_or_default();
        let enabled = parse_boolean_flag(env::var("TC_SMS_ENABLED").ok(), true);
        if !enabled {
            info!("🪛️ SMS is disabled. Text messages will be logged and dropped.");
        } else if api_key.is_empty() {
            warn!("🪛️ TC_SMS_API_KEY is not set. Text messages will be simulated.");
        }
        Self { sender_id, api_key: Secret::new(api_key), enabled }
    }
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that request handlers and middleware can see. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { use_x_forwarded_for: config.use_x_forwarded_for, use_forwarded: config.use_forwarded }
    }
}

/// Reads `name` from the environment, falling back to `default` (with a log entry) if it is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}
