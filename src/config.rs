use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Spotify (opcional - sin credenciales los links de Spotify se rechazan)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Reproducción
    pub default_volume: u8, // Porcentaje 0-100
    pub max_queue_size: usize,
    pub max_playlist_size: usize,

    // Límites
    pub lookup_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            application_id: std::env::var("APPLICATION_ID")?.parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            // Spotify
            spotify_client_id: std::env::var("SPOTIFY_CLIENT_ID")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            spotify_client_secret: std::env::var("SPOTIFY_CLIENT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            // Reproducción
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_playlist_size: std::env::var("MAX_PLAYLIST_SIZE")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,

            // Límites
            lookup_timeout_secs: std::env::var("LOOKUP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_volume > 100 {
            anyhow::bail!(
                "El volumen por defecto debe estar entre 0 y 100, recibido: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor a 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("El límite de expansión de playlists debe ser mayor a 0");
        }

        if self.lookup_timeout_secs == 0 {
            anyhow::bail!("El timeout de búsqueda debe ser mayor a 0");
        }

        // Spotify requiere ambas credenciales o ninguna
        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET deben configurarse juntos");
        }

        Ok(())
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    /// Gain lineal inicial a partir del porcentaje configurado.
    pub fn default_gain(&self) -> f32 {
        f32::from(self.default_volume) / 100.0
    }

    pub fn spotify_enabled(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            spotify_client_id: None,
            spotify_client_secret: None,
            default_volume: 50,
            max_queue_size: 100,
            max_playlist_size: 50,
            lookup_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_gain(), 0.5);
    }

    #[test]
    fn test_volume_out_of_range_rejected() {
        let config = Config {
            default_volume: 150,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_spotify_credentials_must_be_paired() {
        let config = Config {
            spotify_client_id: Some("abc".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
