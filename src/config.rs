use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub business_name: String,
    pub text_provider: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_phone_number: String,
    pub email_provider: String,
    pub mailgun_domain: String,
    pub mailgun_api_key: String,
    pub mailgun_from: String,
    pub alert_provider: String,
    pub alert_gateway_url: String,
    pub alert_gateway_token: String,
    pub reminder_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "garagebook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            business_name: env::var("BUSINESS_NAME").unwrap_or_else(|_| "GarageBook".to_string()),
            text_provider: env::var("TEXT_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_phone_number: env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
            email_provider: env::var("EMAIL_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            mailgun_domain: env::var("MAILGUN_DOMAIN").unwrap_or_default(),
            mailgun_api_key: env::var("MAILGUN_API_KEY").unwrap_or_default(),
            mailgun_from: env::var("MAILGUN_FROM").unwrap_or_default(),
            alert_provider: env::var("ALERT_PROVIDER").unwrap_or_else(|_| "log".to_string()),
            alert_gateway_url: env::var("ALERT_GATEWAY_URL").unwrap_or_default(),
            alert_gateway_token: env::var("ALERT_GATEWAY_TOKEN").unwrap_or_default(),
            reminder_interval_secs: env::var("REMINDER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}
