use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, info};

use crate::{
    bot::MelodiaBot,
    error::{ResolutionError, SessionError},
    player::PlaybackState,
    sources::Resolution,
    ui::{
        buttons::{self, button_ids, MusicControls, VOLUME_STEP},
        embeds,
    },
};

/// Maneja comandos slash
pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "join" => handle_join(ctx, command, bot).await?,
        "leave" => handle_leave(ctx, command, bot).await?,
        "play" => handle_play(ctx, command, bot).await?,
        "skip" => handle_skip(ctx, command, bot).await?,
        "pause" => handle_pause(ctx, command, bot).await?,
        "resume" => handle_resume(ctx, command, bot).await?,
        "stop" => handle_stop(ctx, command, bot).await?,
        "volume" => handle_volume(ctx, command, bot).await?,
        "queue" => handle_queue(ctx, command, bot).await?,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await?,
        "clear" => handle_clear(ctx, command, bot).await?,
        "controls" => handle_controls(ctx, command, bot).await?,
        "help" => handle_help(ctx, command).await?,
        _ => respond_error(ctx, &command, "Comando no reconocido").await?,
    }

    Ok(())
}

/// Maneja los botones del panel de controles
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &MelodiaBot,
) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Botón usado fuera de un servidor"))?;

    let Some(session) = bot.registry.get(guild_id) else {
        return component_error(ctx, &component, session_error_message(SessionError::NotActive))
            .await;
    };

    match component.data.custom_id.as_str() {
        button_ids::PLAY_PAUSE => {
            let result = if session.snapshot().state == PlaybackState::Playing {
                session.pause()
            } else {
                session.resume()
            };

            match result {
                Ok(()) => {
                    // Refresca el panel para que el botón refleje el estado nuevo
                    let is_playing = session.snapshot().state == PlaybackState::Playing;
                    component
                        .create_response(
                            &ctx.http,
                            CreateInteractionResponse::UpdateMessage(
                                CreateInteractionResponseMessage::new()
                                    .components(MusicControls::create_player_controls(is_playing)),
                            ),
                        )
                        .await?;
                }
                Err(e) => component_error(ctx, &component, session_error_message(e)).await?,
            }
        }
        button_ids::SKIP => match session.skip().await {
            Ok(()) => component_message(ctx, &component, "⏭️ Canción saltada").await?,
            Err(e) => component_error(ctx, &component, session_error_message(e)).await?,
        },
        button_ids::STOP => match session.stop() {
            Ok(()) => {
                component_message(ctx, &component, "⏹️ Reproducción detenida y cola limpiada")
                    .await?
            }
            Err(e) => component_error(ctx, &component, session_error_message(e)).await?,
        },
        id @ (button_ids::VOLUME_DOWN | button_ids::VOLUME_UP) => {
            let delta = if id == button_ids::VOLUME_DOWN {
                -VOLUME_STEP
            } else {
                VOLUME_STEP
            };
            let level = buttons::stepped_volume(session.volume_percent(), delta);

            match session.set_volume(level) {
                Ok(applied) => {
                    component_message(ctx, &component, format!("🔊 Volumen: {}%", applied)).await?
                }
                Err(e) => component_error(ctx, &component, session_error_message(e)).await?,
            }
        }
        button_ids::QUEUE => {
            let embed = embeds::create_queue_embed(&session.snapshot());
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embed)
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
        other => {
            debug!("Componente no manejado: {}", other);
            component_error(ctx, &component, "Botón no reconocido").await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    if bot.registry.get(guild_id).is_some() {
        return respond_error(ctx, &command, session_error_message(SessionError::AlreadyActive))
            .await;
    }

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_error(ctx, &command, "Debes estar en un canal de voz para usar /join")
            .await;
    };

    bot.join_voice(ctx, guild_id, voice_channel, command.channel_id)
        .await?;

    respond_message(ctx, &command, "🔊 Conectado al canal de voz").await
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();

    if bot.registry.get(guild_id).is_none() {
        return respond_error(ctx, &command, session_error_message(SessionError::NotActive)).await;
    }

    bot.leave_voice(ctx, guild_id).await?;
    respond_message(ctx, &command, "👋 Desconectado del canal de voz").await
}

async fn handle_play(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let guild_id = command.guild_id.unwrap();
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // La resolución puede tardar: defer antes de tocar la red
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Sesión existente, o auto-conexión al canal de voz del usuario
    let session = match bot.registry.get(guild_id) {
        Some(session) => session,
        None => {
            let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
                return edit_error(ctx, &command, "Debes estar en un canal de voz para usar /play")
                    .await;
            };
            bot.join_voice(ctx, guild_id, voice_channel, command.channel_id)
                .await?;
            bot.registry
                .get(guild_id)
                .ok_or_else(|| anyhow::anyhow!("La sesión recién creada no está en el registro"))?
        }
    };

    let resolution = match bot.resolver.resolve(&query, command.user.id).await {
        Ok(resolution) => resolution,
        Err(e) => return edit_error(ctx, &command, resolution_error_message(e)).await,
    };

    match resolution {
        Resolution::Single(track) => {
            if let Err(e) = session.enqueue(vec![track.clone()]).await {
                return edit_error(ctx, &command, session_error_message(e)).await;
            }

            let snapshot = session.snapshot();
            if snapshot.queue.is_empty() {
                // Arrancó de inmediato: el embed rico llega por el canal de eventos
                command
                    .edit_response(
                        &ctx.http,
                        EditInteractionResponse::new()
                            .content(format!("▶️ Reproduciendo **{}**", track.title)),
                    )
                    .await?;
            } else {
                let embed = embeds::create_track_added_embed(&track, snapshot.queue.len());
                edit_embed(ctx, &command, embed).await?;
            }
        }
        Resolution::Collection { name, tracks } => {
            // El límite de expansión ya se aplicó al consultar el catálogo
            match session.enqueue(tracks).await {
                Ok(added) => {
                    let embed = embeds::create_playlist_added_embed(&name, added);
                    edit_embed(ctx, &command, embed).await?;
                }
                Err(e) => return edit_error(ctx, &command, session_error_message(e)).await,
            }
        }
    }

    Ok(())
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    match session.skip().await {
        Ok(()) => respond_message(ctx, &command, "⏭️ Canción saltada").await,
        Err(e) => respond_error(ctx, &command, session_error_message(e)).await,
    }
}

async fn handle_pause(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    match session.pause() {
        Ok(()) => respond_message(ctx, &command, "⏸️ Reproducción pausada").await,
        Err(e) => respond_error(ctx, &command, session_error_message(e)).await,
    }
}

async fn handle_resume(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    match session.resume() {
        Ok(()) => respond_message(ctx, &command, "▶️ Reproducción reanudada").await,
        Err(e) => respond_error(ctx, &command, session_error_message(e)).await,
    }
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    match session.stop() {
        Ok(()) => {
            respond_message(ctx, &command, "⏹️ Reproducción detenida y cola limpiada").await
        }
        Err(e) => respond_error(ctx, &command, session_error_message(e)).await,
    }
}

async fn handle_volume(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    let level = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "level")
        .and_then(|opt| opt.value.as_i64());

    match level {
        None => {
            respond_message(
                ctx,
                &command,
                format!("🔊 Volumen actual: {}%", session.volume_percent()),
            )
            .await
        }
        Some(level) => match session.set_volume(level) {
            Ok(applied) => {
                respond_message(ctx, &command, format!("🔊 Volumen ajustado a {}%", applied))
                    .await
            }
            Err(e) => respond_error(ctx, &command, session_error_message(e)).await,
        },
    }
}

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    let embed = embeds::create_queue_embed(&session.snapshot());
    respond_embed(ctx, &command, embed).await
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    match session.snapshot().now_playing {
        Some(track) => {
            let embed = embeds::create_now_playing_embed(&track);
            respond_embed(ctx, &command, embed).await
        }
        None => {
            respond_error(ctx, &command, session_error_message(SessionError::NothingPlaying)).await
        }
    }
}

async fn handle_clear(ctx: &Context, command: CommandInteraction, bot: &MelodiaBot) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    let removed = session.clear();
    respond_message(
        ctx,
        &command,
        format!("🗑️ Se quitaron {} canciones de la cola", removed),
    )
    .await
}

async fn handle_controls(
    ctx: &Context,
    command: CommandInteraction,
    bot: &MelodiaBot,
) -> Result<()> {
    let Some(session) = require_session(ctx, &command, bot).await? else {
        return Ok(());
    };

    let snapshot = session.snapshot();
    let is_playing = snapshot.state == PlaybackState::Playing;

    let mut response = CreateInteractionResponseMessage::new()
        .components(MusicControls::create_player_controls(is_playing));
    response = match &snapshot.now_playing {
        Some(track) => response.embed(embeds::create_now_playing_embed(track)),
        None => response.content("🎛️ Panel de controles del reproductor"),
    };

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(response))
        .await?;
    Ok(())
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    respond_embed(ctx, &command, embeds::create_help_embed()).await
}

// Helpers

/// Canal de voz actual del usuario, si está en alguno.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    ctx.cache.guild(guild_id).and_then(|guild| {
        guild
            .voice_states
            .get(&user_id)
            .and_then(|state| state.channel_id)
    })
}

/// Sesión de la guild; si no hay, responde el error y devuelve None.
async fn require_session(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MelodiaBot,
) -> Result<Option<std::sync::Arc<crate::player::PlaybackSession>>> {
    let guild_id = command.guild_id.unwrap();
    match bot.registry.get(guild_id) {
        Some(session) => Ok(Some(session)),
        None => {
            respond_error(ctx, command, session_error_message(SessionError::NotActive)).await?;
            Ok(None)
        }
    }
}

fn session_error_message(err: SessionError) -> &'static str {
    match err {
        SessionError::QueueFull => "La cola de reproducción está llena",
        SessionError::NotPlaying => "No hay nada reproduciéndose para pausar",
        SessionError::NotPaused => "La reproducción no está pausada",
        SessionError::NothingPlaying => "No hay nada reproduciéndose",
        SessionError::NoActiveStream => "No hay ningún stream activo para ajustar",
        SessionError::InvalidVolume => "El volumen debe estar entre 0 y 100",
        SessionError::AlreadyActive => "Ya hay una sesión activa en este servidor",
        SessionError::NotActive => "No hay ninguna sesión activa; usa /join primero",
    }
}

fn resolution_error_message(err: ResolutionError) -> &'static str {
    match err {
        ResolutionError::NotFound => "No se encontraron resultados para tu búsqueda",
        ResolutionError::CatalogUnavailable => {
            "Spotify no está configurado: agrega SPOTIFY_CLIENT_ID y SPOTIFY_CLIENT_SECRET, o usa un enlace de YouTube"
        }
        ResolutionError::SourceRejected => {
            "Esa fuente no se puede reproducir (transmisión en vivo o contenido protegido)"
        }
    }
}

async fn respond_message(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content.into()),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_error(
    ctx: &Context,
    command: &CommandInteraction,
    message: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_error_embed(&message.into()))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn component_message(
    ctx: &Context,
    component: &ComponentInteraction,
    content: impl Into<String>,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content.into())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn component_error(
    ctx: &Context,
    component: &ComponentInteraction,
    message: impl Into<String>,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::create_error_embed(&message.into()))
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn edit_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: CreateEmbed,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;
    Ok(())
}

async fn edit_error(
    ctx: &Context,
    command: &CommandInteraction,
    message: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(
            &ctx.http,
            EditInteractionResponse::new().embed(embeds::create_error_embed(&message.into())),
        )
        .await?;
    Ok(())
}
