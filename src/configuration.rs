use crate::error::ConfigError;

const ONE_DAY_SECONDS: i64 = 24 * 60 * 60;
const ONE_MONTH_SECONDS: i64 = 30 * ONE_DAY_SECONDS;
const MAX_TOKEN_EXPIRY_SECONDS: i64 = 10 * 365 * ONE_DAY_SECONDS;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub password: PasswordSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT signing settings.
///
/// Access and refresh tokens are signed with different secrets so one can
/// never be presented as the other.
#[derive(serde::Deserialize, Clone, Debug)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,   // seconds (86400 = one day)
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,  // seconds (2592000 = thirty days)
}

fn default_access_token_expiry() -> i64 {
    ONE_DAY_SECONDS
}

fn default_refresh_token_expiry() -> i64 {
    ONE_MONTH_SECONDS
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.access_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.access_token_secret".to_string()));
        }
        if self.refresh_token_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt.refresh_token_secret".to_string()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(ConfigError::InvalidValue(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        if self.access_token_expiry < 0 || self.refresh_token_expiry < 0 {
            return Err(ConfigError::InvalidValue(
                "token expiry must not be negative".to_string(),
            ));
        }
        if self.access_token_expiry > MAX_TOKEN_EXPIRY_SECONDS
            || self.refresh_token_expiry > MAX_TOKEN_EXPIRY_SECONDS
        {
            return Err(ConfigError::InvalidValue(format!(
                "token expiry must not exceed {} seconds",
                MAX_TOKEN_EXPIRY_SECONDS
            )));
        }
        Ok(())
    }
}

/// bcrypt work factor
#[derive(serde::Deserialize, Clone, Debug)]
pub struct PasswordSettings {
    pub cost: u32,
}

impl Default for PasswordSettings {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

/// Load settings from `configuration.yaml`, overridden by `APP_`-prefixed
/// environment variables (`APP_JWT__ACCESS_TOKEN_SECRET=...`).
pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
