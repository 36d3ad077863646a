use serenity::all::Timestamp;
use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use crate::player::{PlaybackState, SessionSnapshot};
use crate::sources::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Melodía";

/// Embed de la canción que está sonando ahora.
pub fn create_now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", &track.artist, true)
        .field("⏱️ Duración", format_duration(track.duration_secs), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field("🔗 Fuente", track.source_kind.label(), true);

    if let Some(album) = &track.album {
        embed = embed.field("💿 Álbum", album, true);
    }

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    if let Some(url) = &track.page_url {
        embed = embed.url(url);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de confirmación cuando una canción entra a la cola.
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}**", track.title))
        .color(colors::INFO_BLUE)
        .field("🎤 Artista", &track.artist, true)
        .field("⏱️ Duración", format_duration(track.duration_secs), true)
        .field("📊 Posición en cola", position.to_string(), true)
        .field("🔗 Fuente", track.source_kind.label(), true);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá automáticamente si no hay música sonando",
        ))
}

/// Embed de confirmación cuando una playlist entra completa a la cola.
pub fn create_playlist_added_embed(name: &str, track_count: usize) -> CreateEmbed {
    CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(format!(
            "Se agregaron **{} canciones** de **{}** a la cola de reproducción",
            track_count, name
        ))
        .color(colors::MUSIC_PURPLE)
        .field("📊 Canciones agregadas", track_count.to_string(), true)
        .footer(CreateEmbedFooter::new(
            "🎵 La reproducción comenzará automáticamente • Usa /queue para ver todas las canciones",
        ))
        .timestamp(Timestamp::now())
}

/// Embed de la cola: estado actual más las primeras 10 canciones en espera.
pub fn create_queue_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    embed = match (&snapshot.now_playing, snapshot.state) {
        (Some(track), PlaybackState::Paused) => embed.field(
            "⏸️ En pausa",
            format!("**{}** — {}", track.title, track.artist),
            false,
        ),
        (Some(track), _) => embed.field(
            "🎵 Sonando ahora",
            format!("**{}** — {}", track.title, track.artist),
            false,
        ),
        (None, _) => embed.field("💤 Nada sonando", "La sesión está ociosa", false),
    };

    if snapshot.queue.is_empty() {
        return embed
            .description("La cola está vacía. Usa `/play` para agregar canciones.")
            .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
            .timestamp(Timestamp::now());
    }

    let mut lines = Vec::new();
    for (i, track) in snapshot.queue.iter().take(10).enumerate() {
        lines.push(format!(
            "`{}.` **{}** `[{}]` — <@{}>",
            i + 1,
            track.title,
            format_duration(track.duration_secs),
            track.requested_by
        ));
    }
    if snapshot.queue.len() > 10 {
        lines.push(format!("… y {} más", snapshot.queue.len() - 10));
    }

    embed
        .field(
            format!("⏭️ En espera ({})", snapshot.queue.len()),
            lines.join("\n"),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Embed de aviso cuando un track no pudo reproducirse y se saltó solo.
pub fn create_track_failed_embed(track: &Track, reason: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("⚠️ Canción Saltada")
        .description(format!(
            "No se pudo reproducir **{}**: {}",
            track.title, reason
        ))
        .color(colors::ERROR_RED)
        .footer(CreateEmbedFooter::new(
            "🎵 Continuando con la siguiente canción de la cola",
        ))
        .timestamp(Timestamp::now())
}

/// Embed de ayuda con todos los comandos disponibles.
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Comandos de Melodía")
        .color(colors::INFO_BLUE)
        .field(
            "🔌 Conexión",
            "`/join` - Conecta el bot a tu canal de voz\n\
             `/leave` - Desconecta el bot del canal de voz",
            false,
        )
        .field(
            "▶️ Reproducción",
            "`/play <búsqueda o URL>` - Reproduce una canción, playlist o álbum\n\
             `/skip` - Salta a la siguiente canción\n\
             `/pause` - Pausa la reproducción actual\n\
             `/resume` - Reanuda la reproducción pausada\n\
             `/stop` - Detiene la reproducción y limpia la cola",
            false,
        )
        .field(
            "📋 Cola",
            "`/queue` - Muestra la cola de reproducción\n\
             `/nowplaying` - Muestra la canción actual\n\
             `/clear` - Limpia la cola sin tocar la canción actual",
            false,
        )
        .field(
            "🎛️ Controles",
            "`/volume [nivel]` - Muestra o ajusta el volumen (0-100)\n\
             `/controls` - Abre el panel de botones del reproductor",
            false,
        )
        .footer(CreateEmbedFooter::new(
            "🎵 Soporta búsquedas y enlaces de YouTube, y enlaces de Spotify",
        ))
        .timestamp(Timestamp::now())
}

/// Embed genérico de error para respuestas de comandos.
pub fn create_error_embed(message: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description(message)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
}

/// Formatea segundos como duración legible; 0 significa desconocida.
pub fn format_duration(total_seconds: u64) -> String {
    if total_seconds == 0 {
        return "Desconocida".to_string();
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
