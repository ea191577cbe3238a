use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub spoonacular_api_key: String,
    pub spoonacular_base_url: String,
    pub default_user_id: Uuid,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let spoonacular_api_key = std::env::var("SPOONACULAR_API_KEY")
            .unwrap_or_else(|_| "your_spoonacular_api_key".into());
        let spoonacular_base_url = std::env::var("SPOONACULAR_BASE_URL")
            .unwrap_or_else(|_| "https://api.spoonacular.com".into());
        let default_user_id = match std::env::var("DEFAULT_USER_ID") {
            Ok(raw) => raw.parse()?,
            Err(_) => Uuid::nil(),
        };
        Ok(Self {
            database_url,
            spoonacular_api_key,
            spoonacular_base_url,
            default_user_id,
        })
    }
}
