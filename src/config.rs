use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub stripe_secret_key: String,
    pub invoice_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY")?;
        let invoice_dir = env::var("INVOICE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/invoices"));
        Ok(Self {
            database_url,
            host,
            port,
            stripe_secret_key,
            invoice_dir,
        })
    }
}
