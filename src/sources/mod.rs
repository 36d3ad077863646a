pub mod resolver;
pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

use crate::error::ResolutionError;

pub use resolver::{Resolution, TrackResolver};
pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

/// Procedencia de un track: de qué catálogo salió y cómo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Resuelto directamente contra YouTube (búsqueda o URL).
    YouTube,
    /// Metadata de Spotify; el stream se resuelve perezosamente al reproducir.
    Spotify,
    /// Track de Spotify convertido a un stream directo de YouTube.
    SpotifyViaYouTube,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::YouTube => "📺 YouTube",
            SourceKind::Spotify => "🎵 Spotify",
            SourceKind::SpotifyViaYouTube => "🎵 Spotify → 📺 YouTube",
        }
    }
}

/// Descriptor inmutable de un item reproducible.
///
/// Todos los campos se fijan una sola vez al momento de la resolución;
/// ninguna operación posterior lo muta.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    /// Duración en segundos; 0 = desconocida (solo informativa).
    pub duration_secs: u64,
    pub source_kind: SourceKind,
    /// Localizador opaco para el backend: URL directa de audio o URL de
    /// catálogo que se re-resuelve al momento de reproducir.
    pub stream_ref: String,
    pub artist: String,
    pub album: Option<String>,
    pub thumbnail: Option<String>,
    pub page_url: Option<String>,
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,
}

impl Track {
    /// Track resuelto directamente contra YouTube.
    pub fn from_youtube(hit: PrimaryHit, requested_by: UserId) -> Self {
        Self {
            title: hit.title,
            duration_secs: hit.duration_secs,
            source_kind: SourceKind::YouTube,
            stream_ref: hit.stream_url,
            artist: hit
                .uploader
                .unwrap_or_else(|| "Desconocido".to_string()),
            album: None,
            thumbnail: hit.thumbnail,
            page_url: hit.page_url,
            requested_by,
            requested_at: Utc::now(),
        }
    }

    /// Track de Spotify sin convertir; `stream_ref` apunta al catálogo.
    pub fn from_spotify(item: CatalogItem, requested_by: UserId) -> Self {
        Self {
            title: item.title,
            duration_secs: item.duration_secs,
            source_kind: SourceKind::Spotify,
            stream_ref: item.item_url.clone(),
            artist: item.artist,
            album: item.album,
            thumbnail: item.thumbnail,
            page_url: Some(item.item_url),
            requested_by,
            requested_at: Utc::now(),
        }
    }

    /// Conversión Spotify → YouTube: se prefiere el stream directo de YouTube
    /// pero se conserva la metadata de presentación de Spotify.
    pub fn from_spotify_via_youtube(
        hit: PrimaryHit,
        item: CatalogItem,
        requested_by: UserId,
    ) -> Self {
        Self {
            title: hit.title,
            duration_secs: hit.duration_secs,
            source_kind: SourceKind::SpotifyViaYouTube,
            stream_ref: hit.stream_url,
            artist: item.artist,
            album: item.album,
            thumbnail: item.thumbnail.or(hit.thumbnail),
            page_url: Some(item.item_url),
            requested_by,
            requested_at: Utc::now(),
        }
    }
}

/// Resultado de una búsqueda en el catálogo primario (YouTube).
#[derive(Debug, Clone)]
pub struct PrimaryHit {
    pub title: String,
    pub duration_secs: u64,
    /// URL directa de audio que el backend puede abrir.
    pub stream_url: String,
    pub thumbnail: Option<String>,
    pub uploader: Option<String>,
    pub page_url: Option<String>,
}

/// Un item del catálogo secundario (Spotify).
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_secs: u64,
    /// URL de la página del item en el catálogo; no es un stream directo.
    pub item_url: String,
    pub thumbnail: Option<String>,
}

/// Resultado de resolver texto o URL contra el catálogo secundario.
#[derive(Debug, Clone)]
pub enum SecondaryLookup {
    Single(CatalogItem),
    Collection { name: String, items: Vec<CatalogItem> },
}

/// Catálogo primario: búsqueda de texto o URL → stream directo.
///
/// El colaborador debe rechazar transmisiones en vivo con
/// [`ResolutionError::SourceRejected`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimaryCatalog: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<PrimaryHit, ResolutionError>;
}

/// Catálogo secundario: metadata curada, requiere credenciales.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecondaryCatalog: Send + Sync {
    async fn search_or_resolve(&self, query: &str) -> Result<SecondaryLookup, ResolutionError>;
}
