use async_process::Command;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{PrimaryCatalog, PrimaryHit};
use crate::error::ResolutionError;

/// Cliente de YouTube a través de yt-dlp.
///
/// Cada consulta lanza un subproceso `yt-dlp --dump-json`; las transmisiones
/// en vivo y el contenido con DRM se rechazan explícitamente.
pub struct YouTubeClient {
    // Limitar requests concurrentes para evitar rate limiting
    rate_limiter: tokio::sync::Semaphore,
}

/// Información extraída de yt-dlp
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    title: String,
    duration: Option<f64>,
    uploader: Option<String>,
    thumbnail: Option<String>,
    webpage_url: Option<String>,
    url: Option<String>,
    formats: Option<Vec<Format>>,
    is_live: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Format {
    url: String,
    acodec: Option<String>,
}

impl YouTubeClient {
    pub fn new() -> Self {
        Self {
            rate_limiter: tokio::sync::Semaphore::new(3),
        }
    }

    /// Verifica si una URL es de YouTube
    pub fn is_youtube_url(url: &str) -> bool {
        let youtube_regex = Regex::new(
            r"^(https?://)?(www\.)?(youtube\.com/(watch\?v=|embed/|v/)|youtu\.be/|music\.youtube\.com/)",
        )
        .expect("regex inválida");

        youtube_regex.is_match(url)
    }

    /// Ejecuta yt-dlp sobre una URL o una búsqueda `ytsearch1:`.
    async fn extract_info(&self, target: &str) -> Result<YtDlpInfo, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|_| ResolutionError::NotFound)?;

        debug!("📊 Ejecutando yt-dlp para: {}", target);

        let output = Command::new("yt-dlp")
            .args([
                "--no-playlist",
                "--dump-json",
                "-f",
                "bestaudio/best",
                "--no-warnings",
                target,
            ])
            .output()
            .await
            .map_err(|e| {
                warn!("❌ No se pudo ejecutar yt-dlp: {}", e);
                ResolutionError::NotFound
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if Self::is_restricted_error(&stderr) {
                warn!("🔒 Contenido rechazado por yt-dlp: {}", stderr.trim());
                return Err(ResolutionError::SourceRejected);
            }
            debug!("yt-dlp sin resultados: {}", stderr.trim());
            return Err(ResolutionError::NotFound);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Con ytsearch1 el resultado sigue siendo una línea JSON por entrada
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or(ResolutionError::NotFound)?;

        serde_json::from_str(line).map_err(|e| {
            warn!("❌ Respuesta de yt-dlp no parseable: {}", e);
            ResolutionError::NotFound
        })
    }

    fn is_restricted_error(stderr: &str) -> bool {
        let lower = stderr.to_lowercase();
        lower.contains("drm") || lower.contains("protected") || lower.contains("live event")
    }

    /// Elige la URL de audio del resultado: el formato ya seleccionado,
    /// el primer formato con audio, o la página como último recurso.
    fn pick_stream_url(info: &YtDlpInfo) -> Option<String> {
        if let Some(url) = &info.url {
            return Some(url.clone());
        }

        if let Some(formats) = &info.formats {
            let audio = formats
                .iter()
                .find(|f| f.acodec.as_deref().is_some_and(|c| c != "none"));
            if let Some(format) = audio {
                return Some(format.url.clone());
            }
        }

        info.webpage_url.clone()
    }

    fn info_to_hit(info: YtDlpInfo) -> Result<PrimaryHit, ResolutionError> {
        if info.is_live.unwrap_or(false) {
            // Transmisiones en vivo no soportadas
            return Err(ResolutionError::SourceRejected);
        }

        let stream_url = Self::pick_stream_url(&info).ok_or(ResolutionError::NotFound)?;

        Ok(PrimaryHit {
            title: info.title,
            duration_secs: info.duration.map(|d| d as u64).unwrap_or(0),
            stream_url,
            thumbnail: info.thumbnail,
            uploader: info.uploader,
            page_url: info.webpage_url,
        })
    }
}

impl Default for YouTubeClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryCatalog for YouTubeClient {
    async fn lookup(&self, query: &str) -> Result<PrimaryHit, ResolutionError> {
        let target = if query.starts_with("http://") || query.starts_with("https://") {
            query.to_string()
        } else {
            // Texto ambiguo: yt-dlp devuelve su mejor coincidencia
            format!("ytsearch1:{}", query)
        };

        info!("🔍 Buscando en YouTube: {}", query);

        let info = self.extract_info(&target).await?;
        Self::info_to_hit(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        ));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url(
            "https://music.youtube.com/watch?v=test"
        ));
        assert!(!YouTubeClient::is_youtube_url("https://example.com/video"));
        assert!(!YouTubeClient::is_youtube_url(
            "https://open.spotify.com/track/abc"
        ));
    }

    #[test]
    fn test_live_broadcast_rejected() {
        let info = YtDlpInfo {
            title: "Radio 24/7".to_string(),
            duration: None,
            uploader: None,
            thumbnail: None,
            webpage_url: Some("https://youtube.com/watch?v=live".to_string()),
            url: Some("https://example.com/stream".to_string()),
            formats: None,
            is_live: Some(true),
        };

        assert_eq!(
            YouTubeClient::info_to_hit(info).unwrap_err(),
            ResolutionError::SourceRejected
        );
    }

    #[test]
    fn test_unknown_duration_maps_to_zero() {
        let info = YtDlpInfo {
            title: "Canción".to_string(),
            duration: None,
            uploader: Some("Canal".to_string()),
            thumbnail: None,
            webpage_url: Some("https://youtube.com/watch?v=abc".to_string()),
            url: Some("https://example.com/audio".to_string()),
            formats: None,
            is_live: None,
        };

        let hit = YouTubeClient::info_to_hit(info).unwrap();
        assert_eq!(hit.duration_secs, 0);
        assert_eq!(hit.stream_url, "https://example.com/audio");
    }

    #[test]
    fn test_stream_url_falls_back_to_audio_format() {
        let info = YtDlpInfo {
            title: "Canción".to_string(),
            duration: Some(210.0),
            uploader: None,
            thumbnail: None,
            webpage_url: Some("https://youtube.com/watch?v=abc".to_string()),
            url: None,
            formats: Some(vec![
                Format {
                    url: "https://example.com/video-only".to_string(),
                    acodec: Some("none".to_string()),
                },
                Format {
                    url: "https://example.com/audio".to_string(),
                    acodec: Some("opus".to_string()),
                },
            ]),
            is_live: Some(false),
        };

        let hit = YouTubeClient::info_to_hit(info).unwrap();
        assert_eq!(hit.stream_url, "https://example.com/audio");
    }
}
