//! Capa de Discord: registro de comandos, conexiones de voz y despacho de
//! interacciones hacia las sesiones de reproducción.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    builder::CreateMessage,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{
    config::Config,
    error::SessionError,
    player::{SessionEvent, SessionRegistry, SongbirdBackend},
    sources::{SecondaryCatalog, SpotifyClient, TrackResolver, YouTubeClient},
    ui::embeds,
};

/// Handler principal del bot: posee el resolver compartido y el registro de
/// sesiones por guild.
pub struct MelodiaBot {
    config: Arc<Config>,
    pub registry: Arc<SessionRegistry>,
    pub resolver: Arc<TrackResolver>,
}

impl MelodiaBot {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let secondary: Option<Arc<dyn SecondaryCatalog>> = match config.spotify_enabled() {
            true => {
                let client_id = config.spotify_client_id.clone().unwrap_or_default();
                let client_secret = config.spotify_client_secret.clone().unwrap_or_default();
                Some(Arc::new(SpotifyClient::new(
                    client_id,
                    client_secret,
                    config.max_playlist_size,
                )))
            }
            false => {
                info!("🎵 Spotify deshabilitado: sin credenciales configuradas");
                None
            }
        };

        let resolver = Arc::new(TrackResolver::new(
            Arc::new(YouTubeClient::new()),
            secondary,
            config.lookup_timeout(),
        ));

        let registry = Arc::new(SessionRegistry::new(
            resolver.clone(),
            config.max_queue_size,
            config.default_gain(),
            config.lookup_timeout(),
        ));

        Self {
            config,
            registry,
            resolver,
        }
    }

    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::from(guild_id);
                commands::register_guild_commands(ctx, guild_id).await?;
                info!("✅ Comandos registrados para guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Conecta al canal de voz y crea la sesión de la guild. Los eventos de
    /// la sesión se publican en `text_channel`.
    pub async fn join_voice(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
        text_channel: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Error al conectar al canal de voz: {}", e))?;

        let backend = Arc::new(SongbirdBackend::new(call));

        match self.registry.join(guild_id, backend) {
            Ok(events) => {
                spawn_event_forwarder(ctx.http.clone(), text_channel, events);
                info!("🔊 Conectado al canal de voz en guild {}", guild_id);
                Ok(())
            }
            Err(e) => {
                // La sesión no se pudo crear: no dejar la conexión colgada
                let _ = manager.remove(guild_id).await;
                Err(anyhow::anyhow!(e))
            }
        }
    }

    /// Desmonta la sesión de la guild y desconecta del canal de voz.
    pub async fn leave_voice(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        self.registry
            .leave(guild_id)
            .map_err(|e| anyhow::anyhow!(e))?;

        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird no inicializado"))?;
        manager.remove(guild_id).await?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for MelodiaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Si el bot es desconectado del canal (kick, mover, etc.) la sesión de
    /// la guild se desmonta para no dejar streams huérfanos.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot desconectado en guild {}", guild_id);
                match self.registry.leave(guild_id) {
                    Ok(()) => {}
                    Err(SessionError::NotActive) => {}
                    Err(e) => warn!("Error al desmontar la sesión: {}", e),
                }
            }
        }
    }
}

/// Reenvía los eventos de la sesión al canal de texto: el arranque real de
/// una canción puede ocurrir mucho después del comando que la encoló.
fn spawn_event_forwarder(
    http: Arc<serenity::http::Http>,
    channel_id: ChannelId,
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let embed = match &event {
                SessionEvent::TrackStarted(track) => embeds::create_now_playing_embed(track),
                SessionEvent::TrackFailed { track, reason } => {
                    embeds::create_track_failed_embed(track, reason)
                }
            };

            if let Err(e) = channel_id
                .send_message(&http, CreateMessage::new().embed(embed))
                .await
            {
                warn!("No se pudo publicar el evento de sesión: {}", e);
            }
        }
    });
}
