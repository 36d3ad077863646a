use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        join_command(),
        leave_command(),
        play_command(),
        skip_command(),
        pause_command(),
        resume_command(),
        stop_command(),
        volume_command(),
        queue_command(),
        nowplaying_command(),
        clear_command(),
        controls_command(),
        help_command(),
    ]
}

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

// Comandos de conexión

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Conecta el bot a tu canal de voz")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Desconecta el bot del canal de voz")
}

// Comandos de reproducción

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce una canción, playlist o álbum")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda",
            )
            .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta a la siguiente canción")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa la reproducción actual")
}

fn resume_command() -> CreateCommand {
    CreateCommand::new("resume").description("Reanuda la reproducción pausada")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y limpia la cola")
}

// Comandos de audio

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Ajusta el volumen de reproducción")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "level",
                "Nivel de volumen (0-100)",
            )
            .min_int_value(0)
            .max_int_value(100),
        )
}

// Comandos de cola

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Muestra la cola de reproducción")
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Muestra información de la canción actual")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Limpia la cola sin tocar la canción actual")
}

// Comandos de interfaz

fn controls_command() -> CreateCommand {
    CreateCommand::new("controls").description("Muestra el panel de botones del reproductor")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Muestra todos los comandos disponibles")
}
