use async_trait::async_trait;
use parking_lot::Mutex;
use songbird::{
    input::{HttpRequest, Input, YoutubeDl},
    tracks::TrackHandle,
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use tracing::debug;

use crate::error::StreamError;
use crate::sources::{SpotifyClient, YouTubeClient};

/// Aviso de fin de stream: se dispara exactamente una vez, sea fin natural,
/// stop explícito o error de reproducción.
pub type EndNotify = Box<dyn FnOnce() + Send + 'static>;

/// Colaborador de streaming: abre una URL y entrega un handle de control.
#[async_trait]
pub trait StreamBackend: Send + Sync {
    async fn open(
        &self,
        url: &str,
        gain: f32,
        on_end: EndNotify,
    ) -> Result<Box<dyn StreamHandle>, StreamError>;
}

/// Control de un stream activo.
pub trait StreamHandle: Send + Sync {
    fn pause(&self) -> Result<(), StreamError>;
    fn resume(&self) -> Result<(), StreamError>;
    fn stop(&self) -> Result<(), StreamError>;
    fn set_gain(&self, gain: f32) -> Result<(), StreamError>;
}

/// Backend de producción sobre songbird.
pub struct SongbirdBackend {
    call: Arc<tokio::sync::Mutex<Call>>,
    http: reqwest::Client,
}

impl SongbirdBackend {
    pub fn new(call: Arc<tokio::sync::Mutex<Call>>) -> Self {
        Self {
            call,
            http: reqwest::Client::new(),
        }
    }

    /// Las URLs de página (YouTube, Spotify) pasan por yt-dlp; el resto se
    /// trata como stream HTTP directo.
    fn build_input(&self, url: &str) -> Input {
        if YouTubeClient::is_youtube_url(url) || SpotifyClient::is_spotify_url(url) {
            Input::from(YoutubeDl::new(self.http.clone(), url.to_string()))
        } else {
            Input::from(HttpRequest::new(self.http.clone(), url.to_string()))
        }
    }
}

#[async_trait]
impl StreamBackend for SongbirdBackend {
    async fn open(
        &self,
        url: &str,
        gain: f32,
        on_end: EndNotify,
    ) -> Result<Box<dyn StreamHandle>, StreamError> {
        let input = self.build_input(url);

        let mut call = self.call.lock().await;
        let handle = call.play_input(input);

        handle
            .set_volume(gain)
            .map_err(|e| StreamError::new(format!("no se pudo fijar el volumen: {}", e)))?;

        // End cubre el fin natural y el stop; Error cubre fallos del driver.
        // Ambos comparten el aviso para que dispare una sola vez.
        let notify = Arc::new(Mutex::new(Some(on_end)));
        handle
            .add_event(
                Event::Track(TrackEvent::End),
                EndEventHandler {
                    notify: notify.clone(),
                },
            )
            .map_err(|e| StreamError::new(format!("no se pudo registrar el evento End: {}", e)))?;
        handle
            .add_event(Event::Track(TrackEvent::Error), EndEventHandler { notify })
            .map_err(|e| {
                StreamError::new(format!("no se pudo registrar el evento Error: {}", e))
            })?;

        debug!("🎵 Stream abierto: {}", url);
        Ok(Box::new(SongbirdHandle { handle }))
    }
}

struct SongbirdHandle {
    handle: TrackHandle,
}

impl StreamHandle for SongbirdHandle {
    fn pause(&self) -> Result<(), StreamError> {
        self.handle
            .pause()
            .map_err(|e| StreamError::new(e.to_string()))
    }

    fn resume(&self) -> Result<(), StreamError> {
        self.handle
            .play()
            .map_err(|e| StreamError::new(e.to_string()))
    }

    fn stop(&self) -> Result<(), StreamError> {
        self.handle
            .stop()
            .map_err(|e| StreamError::new(e.to_string()))
    }

    fn set_gain(&self, gain: f32) -> Result<(), StreamError> {
        self.handle
            .set_volume(gain)
            .map_err(|e| StreamError::new(e.to_string()))
    }
}

struct EndEventHandler {
    notify: Arc<Mutex<Option<EndNotify>>>,
}

#[async_trait]
impl VoiceEventHandler for EndEventHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        if let Some(notify) = self.notify.lock().take() {
            debug!("Stream terminado, notificando a la sesión");
            notify();
        }
        None
    }
}
