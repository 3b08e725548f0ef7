/// Environment-driven configuration, read once at startup. A `.env` file is
/// honored when present.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    /// Username that is granted the admin role at signup.
    pub admin_username: Option<String>,
}

impl Config {
    pub fn from_env() -> Config {
        dotenv::dotenv().ok();

        Config {
            database_url: dotenv::var("FITCONNECT_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:fitconnect.db".to_owned()),
            bind_addr: dotenv::var("FITCONNECT_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_owned()),
            admin_username: dotenv::var("FITCONNECT_ADMIN_USERNAME").ok(),
        }
    }
}
