use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::{CatalogItem, SecondaryCatalog, SecondaryLookup};
use crate::error::ResolutionError;

const ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";

/// Tope absoluto de entradas al expandir una playlist o un álbum; el límite
/// configurado nunca lo supera.
pub const MAX_COLLECTION_ITEMS: usize = 50;

/// Cliente de la Web API de Spotify (flujo client-credentials).
///
/// Solo se construye cuando hay credenciales configuradas; la ausencia de
/// credenciales la maneja el resolver como `CatalogUnavailable`.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    collection_cap: usize,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    items: Vec<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    name: String,
    duration_ms: u64,
    artists: Vec<ApiArtist>,
    album: Option<ApiAlbum>,
    external_urls: ExternalUrls,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiAlbum {
    name: String,
    #[serde(default)]
    images: Vec<ApiImage>,
}

#[derive(Debug, Deserialize)]
struct ApiImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistMeta {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracks {
    items: Vec<PlaylistEntry>,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    track: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    name: String,
    #[serde(default)]
    images: Vec<ApiImage>,
    tracks: AlbumTracks,
}

#[derive(Debug, Deserialize)]
struct AlbumTracks {
    items: Vec<AlbumTrack>,
}

#[derive(Debug, Deserialize)]
struct AlbumTrack {
    name: String,
    duration_ms: u64,
    artists: Vec<ApiArtist>,
    external_urls: ExternalUrls,
}

impl SpotifyClient {
    /// `max_collection` limita las expansiones de playlist/álbum; se acota
    /// al tope absoluto [`MAX_COLLECTION_ITEMS`].
    pub fn new(client_id: String, client_secret: String, max_collection: usize) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            collection_cap: max_collection.min(MAX_COLLECTION_ITEMS),
            token: Mutex::new(None),
        }
    }

    /// Verifica si la URL apunta a Spotify.
    pub fn is_spotify_url(url: &str) -> bool {
        url.contains("open.spotify.com") || url.contains("spotify.com")
    }

    /// Extrae el id de recurso de una URL tipo `.../{kind}/{id}?...`.
    fn resource_id(raw: &str, kind: &str) -> Option<String> {
        let parsed = Url::parse(raw).ok()?;
        let mut segments = parsed.path_segments()?;

        while let Some(segment) = segments.next() {
            if segment == kind {
                return segments
                    .next()
                    .filter(|id| !id.is_empty())
                    .map(str::to_string);
            }
        }

        None
    }

    async fn token(&self) -> Result<String, ResolutionError> {
        if let Some(cached) = self.token.lock().as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.value.clone());
            }
        }

        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(ACCOUNTS_URL)
            .header("Authorization", format!("Basic {}", auth))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| {
                warn!("❌ No se pudo contactar a Spotify: {}", e);
                ResolutionError::NotFound
            })?;

        if !response.status().is_success() {
            warn!("❌ Spotify rechazó las credenciales: {}", response.status());
            return Err(ResolutionError::CatalogUnavailable);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            warn!("❌ Respuesta de token inválida: {}", e);
            ResolutionError::NotFound
        })?;

        let value = token.access_token.clone();
        // Renovar un poco antes del vencimiento real
        let expires_at = Instant::now() + Duration::from_secs(token.expires_in.saturating_sub(30));
        *self.token.lock() = Some(CachedToken {
            value: token.access_token,
            expires_at,
        });

        debug!("🔑 Token de Spotify renovado");
        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ResolutionError> {
        let token = self.token().await?;

        let response = self
            .http
            .get(format!("{}{}", API_URL, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!("❌ Error de red con Spotify: {}", e);
                ResolutionError::NotFound
            })?;

        if !response.status().is_success() {
            debug!("Spotify devolvió {} para {}", response.status(), path);
            return Err(ResolutionError::NotFound);
        }

        response.json().await.map_err(|e| {
            warn!("❌ Respuesta de Spotify no parseable: {}", e);
            ResolutionError::NotFound
        })
    }

    fn track_to_item(track: ApiTrack, track_id_url: Option<String>) -> CatalogItem {
        let artist = track
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Desconocido".to_string());
        let (album, thumbnail) = match track.album {
            Some(album) => (
                Some(album.name),
                album.images.first().map(|i| i.url.clone()),
            ),
            None => (None, None),
        };

        CatalogItem {
            title: track.name,
            artist,
            album,
            duration_secs: track.duration_ms / 1000,
            item_url: track
                .external_urls
                .spotify
                .or(track_id_url)
                .unwrap_or_default(),
            thumbnail,
        }
    }

    async fn lookup_track(&self, id: &str) -> Result<CatalogItem, ResolutionError> {
        let track: ApiTrack = self.get_json(&format!("/tracks/{}", id)).await?;
        Ok(Self::track_to_item(track, None))
    }

    async fn lookup_playlist(&self, id: &str) -> Result<SecondaryLookup, ResolutionError> {
        let meta: PlaylistMeta = self
            .get_json(&format!("/playlists/{}?fields=name", id))
            .await?;
        let tracks: PlaylistTracks = self
            .get_json(&format!(
                "/playlists/{}/tracks?limit={}",
                id, self.collection_cap
            ))
            .await?;

        let items: Vec<CatalogItem> = tracks
            .items
            .into_iter()
            .filter_map(|entry| entry.track)
            .take(self.collection_cap)
            .map(|t| Self::track_to_item(t, None))
            .collect();

        if items.is_empty() {
            return Err(ResolutionError::NotFound);
        }

        info!("📋 Playlist \"{}\": {} tracks", meta.name, items.len());
        Ok(SecondaryLookup::Collection {
            name: meta.name,
            items,
        })
    }

    async fn lookup_album(&self, id: &str) -> Result<SecondaryLookup, ResolutionError> {
        let album: AlbumResponse = self.get_json(&format!("/albums/{}", id)).await?;

        let album_name = album.name.clone();
        let thumbnail = album.images.first().map(|i| i.url.clone());

        let items: Vec<CatalogItem> = album
            .tracks
            .items
            .into_iter()
            .take(self.collection_cap)
            .map(|t| CatalogItem {
                artist: t
                    .artists
                    .first()
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| "Desconocido".to_string()),
                title: t.name,
                album: Some(album_name.clone()),
                duration_secs: t.duration_ms / 1000,
                item_url: t.external_urls.spotify.unwrap_or_default(),
                thumbnail: thumbnail.clone(),
            })
            .collect();

        if items.is_empty() {
            return Err(ResolutionError::NotFound);
        }

        info!("💿 Álbum \"{}\": {} tracks", album_name, items.len());
        Ok(SecondaryLookup::Collection {
            name: album_name,
            items,
        })
    }

    async fn search_track(&self, query: &str) -> Result<CatalogItem, ResolutionError> {
        let path = format!(
            "/search?q={}&type=track&limit=1",
            urlencoding::encode(query)
        );
        let results: SearchResponse = self.get_json(&path).await?;

        results
            .tracks
            .items
            .into_iter()
            .next()
            .map(|t| Self::track_to_item(t, None))
            .ok_or(ResolutionError::NotFound)
    }
}

#[async_trait]
impl SecondaryCatalog for SpotifyClient {
    async fn search_or_resolve(&self, query: &str) -> Result<SecondaryLookup, ResolutionError> {
        if Self::is_spotify_url(query) {
            if let Some(id) = Self::resource_id(query, "track") {
                return Ok(SecondaryLookup::Single(self.lookup_track(&id).await?));
            }
            if let Some(id) = Self::resource_id(query, "playlist") {
                return self.lookup_playlist(&id).await;
            }
            if let Some(id) = Self::resource_id(query, "album") {
                return self.lookup_album(&id).await;
            }
            return Err(ResolutionError::NotFound);
        }

        info!("🔍 Buscando en Spotify: {}", query);
        Ok(SecondaryLookup::Single(self.search_track(query).await?))
    }
}
