use serenity::model::id::UserId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{PrimaryCatalog, SecondaryCatalog, SecondaryLookup, Track};
use crate::error::ResolutionError;

/// Resultado de resolver una consulta: un track o una colección expandida.
#[derive(Debug, Clone)]
pub enum Resolution {
    Single(Track),
    Collection { name: String, tracks: Vec<Track> },
}

impl Resolution {
    pub fn tracks(self) -> Vec<Track> {
        match self {
            Resolution::Single(track) => vec![track],
            Resolution::Collection { tracks, .. } => tracks,
        }
    }
}

/// Convierte una consulta libre o un link de catálogo en Tracks.
///
/// Primero intenta el catálogo secundario (Spotify) cuando la consulta lo
/// sugiere, con conversión a stream directo vía el primario (YouTube); si no,
/// va directo al primario. Cada lookup está acotado por un timeout para que
/// un colaborador colgado no bloquee la sesión.
pub struct TrackResolver {
    primary: Arc<dyn PrimaryCatalog>,
    secondary: Option<Arc<dyn SecondaryCatalog>>,
    lookup_timeout: Duration,
}

impl TrackResolver {
    pub fn new(
        primary: Arc<dyn PrimaryCatalog>,
        secondary: Option<Arc<dyn SecondaryCatalog>>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            lookup_timeout,
        }
    }

    fn is_secondary_url(query: &str) -> bool {
        query.contains("open.spotify.com") || query.contains("spotify.com")
    }

    fn suggests_secondary(query: &str) -> bool {
        Self::is_secondary_url(query) || query.to_lowercase().contains("spotify")
    }

    /// Acota un lookup con el timeout configurado; el vencimiento cuenta
    /// como fallo de esa búsqueda.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, ResolutionError>>,
    ) -> Result<T, ResolutionError> {
        match tokio::time::timeout(self.lookup_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏰ Lookup excedió el timeout de {:?}", self.lookup_timeout);
                Err(ResolutionError::NotFound)
            }
        }
    }

    pub async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
    ) -> Result<Resolution, ResolutionError> {
        // Link de Spotify sin credenciales: error específico, no NotFound
        if Self::is_secondary_url(query) && self.secondary.is_none() {
            warn!("❌ Link de Spotify recibido pero Spotify no está configurado");
            return Err(ResolutionError::CatalogUnavailable);
        }

        if Self::suggests_secondary(query) {
            if let Some(secondary) = &self.secondary {
                match self.bounded(secondary.search_or_resolve(query)).await {
                    Ok(SecondaryLookup::Collection { name, items }) => {
                        // Expansión ansiosa: cada miembro se re-resuelve a un
                        // stream directo recién al reproducirse
                        let tracks = items
                            .into_iter()
                            .map(|item| Track::from_spotify(item, requested_by))
                            .collect();
                        return Ok(Resolution::Collection { name, tracks });
                    }
                    Ok(SecondaryLookup::Single(item)) => {
                        return Ok(Resolution::Single(
                            self.convert_or_keep(item, requested_by).await,
                        ));
                    }
                    Err(e) => {
                        // Lookup secundario fallido: se sigue con el primario
                        debug!("Spotify no resolvió la consulta ({}), probando YouTube", e);
                    }
                }
            }
        }

        let hit = self.bounded(self.primary.lookup(query)).await?;
        Ok(Resolution::Single(Track::from_youtube(hit, requested_by)))
    }

    /// Intenta convertir un item de Spotify a un stream directo de YouTube;
    /// si la conversión falla se conserva el track de Spotify tal cual.
    async fn convert_or_keep(&self, item: super::CatalogItem, requested_by: UserId) -> Track {
        let search = format!("{} {}", item.artist, item.title);

        match self.bounded(self.primary.lookup(&search)).await {
            Ok(hit) => {
                info!("🔁 Spotify convertido a YouTube: {}", search);
                Track::from_spotify_via_youtube(hit, item, requested_by)
            }
            Err(e) => {
                debug!("Conversión a YouTube falló ({}), se conserva Spotify", e);
                Track::from_spotify(item, requested_by)
            }
        }
    }

    /// Resuelve la URL de stream al momento de reproducir.
    ///
    /// Los tracks de Spotify se buscan perezosamente en YouTube con
    /// "artista título"; si falla se usa la referencia del catálogo como
    /// mejor esfuerzo (puede no ser reproducible por el backend).
    pub async fn stream_url_for(&self, track: &Track) -> String {
        if track.source_kind != super::SourceKind::Spotify {
            return track.stream_ref.clone();
        }

        let search = format!("{} {}", track.artist, track.title);
        match self.bounded(self.primary.lookup(&search)).await {
            Ok(hit) => {
                info!("🔁 Track de Spotify resuelto en YouTube: {}", search);
                hit.stream_url
            }
            Err(e) => {
                warn!(
                    "⚠️ {} no se encontró en YouTube ({}), usando referencia de Spotify",
                    track.title, e
                );
                track.stream_ref.clone()
            }
        }
    }
}
