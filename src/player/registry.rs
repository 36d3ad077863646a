use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::session::{PlaybackSession, SessionEvent};
use super::stream::StreamBackend;
use crate::error::SessionError;
use crate::sources::TrackResolver;

/// Mapa guild → sesión activa. A lo sumo una sesión por guild; la sesión
/// nace al unirse al canal de voz y muere al salir.
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Arc<PlaybackSession>>,
    resolver: Arc<TrackResolver>,
    queue_capacity: usize,
    default_gain: f32,
    open_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        resolver: Arc<TrackResolver>,
        queue_capacity: usize,
        default_gain: f32,
        open_timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            resolver,
            queue_capacity,
            default_gain,
            open_timeout,
        }
    }

    /// Crea la sesión de la guild y devuelve su canal de eventos.
    pub fn join(
        &self,
        guild_id: GuildId,
        backend: Arc<dyn StreamBackend>,
    ) -> Result<mpsc::UnboundedReceiver<SessionEvent>, SessionError> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(_) => Err(SessionError::AlreadyActive),
            Entry::Vacant(entry) => {
                let (session, events) = PlaybackSession::new(
                    self.resolver.clone(),
                    backend,
                    self.queue_capacity,
                    self.default_gain,
                    self.open_timeout,
                );
                entry.insert(session);
                info!("🔊 Sesión creada para guild {}", guild_id);
                Ok(events)
            }
        }
    }

    /// Desmonta y descarta la sesión de la guild.
    pub fn leave(&self, guild_id: GuildId) -> Result<(), SessionError> {
        match self.sessions.remove(&guild_id) {
            Some((_, session)) => {
                session.teardown();
                info!("👋 Sesión cerrada para guild {}", guild_id);
                Ok(())
            }
            None => Err(SessionError::NotActive),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<PlaybackSession>> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}
