use thiserror::Error;

/// Errores de resolución de una consulta a un track reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Ningún catálogo encontró un resultado para la consulta.
    #[error("no se encontraron resultados")]
    NotFound,
    /// El catálogo requerido no está configurado o no responde.
    #[error("el catálogo no está disponible")]
    CatalogUnavailable,
    /// El catálogo encontró el item pero no es reproducible (en vivo, DRM).
    #[error("la fuente no se puede reproducir")]
    SourceRejected,
}

/// Errores de las operaciones de sesión; cada variante mapea a una respuesta
/// concreta para el usuario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("la cola de reproducción está llena")]
    QueueFull,
    #[error("no hay nada reproduciéndose")]
    NotPlaying,
    #[error("la reproducción no está pausada")]
    NotPaused,
    #[error("no hay nada reproduciéndose")]
    NothingPlaying,
    #[error("no hay ningún stream activo")]
    NoActiveStream,
    #[error("el volumen debe estar entre 0 y 100")]
    InvalidVolume,
    #[error("ya hay una sesión activa en esta guild")]
    AlreadyActive,
    #[error("no hay ninguna sesión activa en esta guild")]
    NotActive,
}

/// Error opaco del backend de audio.
#[derive(Debug, Clone, Error)]
#[error("error de stream: {0}")]
pub struct StreamError(pub String);

impl StreamError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}
