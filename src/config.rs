use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

/// Credentials for the SMS verification provider.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyConfig {
    pub account_sid: String,
    pub auth_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub s3: S3Config,
    pub verify: VerifyConfig,
    pub realmail_api_key: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "shutterlog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "shutterlog-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let s3 = S3Config {
            endpoint: std::env::var("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };
        let verify = VerifyConfig {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID")?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN")?,
        };
        let realmail_api_key = std::env::var("REALMAIL_API_KEY")?;

        Ok(Self {
            database_url,
            jwt,
            s3,
            verify,
            realmail_api_key,
        })
    }
}
