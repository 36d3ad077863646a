use std::collections::VecDeque;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::sources::Track;

/// Cola FIFO acotada de tracks pendientes de una sesión.
///
/// Orden de inserción = orden de reproducción; el desborde se rechaza,
/// nunca se descarta en silencio.
#[derive(Debug)]
pub struct SessionQueue {
    items: VecDeque<Track>,
    capacity: usize,
}

impl SessionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            capacity,
        }
    }

    /// Agrega un track al final de la cola.
    pub fn push(&mut self, track: Track) -> Result<(), SessionError> {
        if self.items.len() >= self.capacity {
            return Err(SessionError::QueueFull);
        }

        info!("➕ Agregado a la cola: {}", track.title);
        self.items.push_back(track);
        Ok(())
    }

    /// Agrega una lista completa de forma atómica: si no entra entera,
    /// la cola queda sin cambios.
    pub fn push_all(&mut self, tracks: Vec<Track>) -> Result<usize, SessionError> {
        if self.items.len() + tracks.len() > self.capacity {
            return Err(SessionError::QueueFull);
        }

        let added = tracks.len();
        self.items.extend(tracks);
        info!("➕ Agregados {} tracks a la cola", added);
        Ok(added)
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(track) = &next {
            debug!("➡️ Siguiente en cola (FIFO): {}", track.title);
        }
        next
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Vacía la cola y devuelve cuántos tracks se eliminaron.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        if removed > 0 {
            info!("🗑️ Cola limpiada: {} tracks eliminados", removed);
        }
        removed
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }
}
