use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::queue::SessionQueue;
use super::stream::{EndNotify, StreamBackend, StreamHandle};
use crate::error::SessionError;
use crate::sources::{Track, TrackResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Notificaciones fire-and-forget de la sesión; la capa de comandos las
/// reenvía al canal de texto (la reproducción puede ocurrir mucho después
/// del enqueue original).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TrackStarted(Track),
    TrackFailed { track: Track, reason: String },
}

/// Vista inmutable de la sesión para mostrar.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub now_playing: Option<Track>,
    pub queue: Vec<Track>,
}

struct SessionInner {
    queue: SessionQueue,
    state: PlaybackState,
    now_playing: Option<Track>,
    handle: Option<Box<dyn StreamHandle>>,
    gain: f32,
    /// Número de secuencia del stream vigente; los avisos de fin de streams
    /// reemplazados o detenidos llegan con un número viejo y se ignoran.
    stream_seq: u64,
    /// true mientras el bucle de avance está corriendo; garantiza un solo
    /// bucle a la vez.
    advancing: bool,
    /// El aviso de fin del stream vigente llegó antes de que el bucle de
    /// avance guardara el handle (el driver puede morir durante el open).
    completed_early: bool,
}

/// Máquina de estados de reproducción de una guild.
///
/// Todas las transiciones se serializan con el mutex interno, que se libera
/// antes de cualquier llamada de red (resolución, apertura de stream). El
/// único mecanismo que avanza la cola es `stream_completed`: tanto el fin
/// natural como skip pasan por el mismo camino de avance.
pub struct PlaybackSession {
    inner: Mutex<SessionInner>,
    resolver: Arc<TrackResolver>,
    backend: Arc<dyn StreamBackend>,
    events: mpsc::UnboundedSender<SessionEvent>,
    open_timeout: Duration,
    /// Auto-referencia débil para los avisos de fin de stream; no retiene la
    /// sesión viva una vez removida del registro.
    weak: Weak<Self>,
}

impl PlaybackSession {
    pub fn new(
        resolver: Arc<TrackResolver>,
        backend: Arc<dyn StreamBackend>,
        queue_capacity: usize,
        default_gain: f32,
        open_timeout: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();

        let session = Arc::new_cyclic(|weak| Self {
            inner: Mutex::new(SessionInner {
                queue: SessionQueue::new(queue_capacity),
                state: PlaybackState::Idle,
                now_playing: None,
                handle: None,
                gain: default_gain,
                stream_seq: 0,
                advancing: false,
                completed_early: false,
            }),
            resolver,
            backend,
            events,
            open_timeout,
            weak: weak.clone(),
        });

        (session, receiver)
    }

    /// Agrega tracks a la cola; si la sesión está ociosa arranca la
    /// reproducción antes de devolver.
    pub async fn enqueue(&self, tracks: Vec<Track>) -> Result<usize, SessionError> {
        let (added, start) = {
            let mut inner = self.inner.lock();
            let added = inner.queue.push_all(tracks)?;
            let start = inner.state == PlaybackState::Idle && !inner.advancing;
            (added, start)
        };

        if start {
            self.advance().await;
        }

        Ok(added)
    }

    /// Bucle de avance: saca el próximo track, resuelve su stream y lo abre.
    ///
    /// Un fallo de resolución o de apertura notifica el track y sigue con el
    /// siguiente; la sesión nunca queda trabada por un track irreproducible.
    ///
    /// El future va en un Box: el aviso de fin de stream vuelve a entrar acá
    /// vía `stream_completed` y la recursión entre ambos futures necesita un
    /// tipo con tamaño conocido.
    fn advance(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self.advance_inner())
    }

    async fn advance_inner(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.advancing {
                return;
            }
            inner.advancing = true;
        }

        loop {
            let (next, gain) = {
                let mut inner = self.inner.lock();
                match inner.queue.pop_front() {
                    Some(track) => (track, inner.gain),
                    None => {
                        inner.state = PlaybackState::Idle;
                        inner.now_playing = None;
                        inner.handle = None;
                        inner.advancing = false;
                        debug!("📭 Cola vacía, sesión ociosa");
                        return;
                    }
                }
            };

            // Resolución y apertura fuera del lock
            let url = self.resolver.stream_url_for(&next).await;

            let seq = {
                let mut inner = self.inner.lock();
                inner.stream_seq += 1;
                inner.completed_early = false;
                inner.stream_seq
            };

            let weak = self.weak.clone();
            let on_end: EndNotify = Box::new(move || {
                if let Some(session) = weak.upgrade() {
                    tokio::spawn(async move {
                        session.stream_completed(seq).await;
                    });
                }
            });

            let opened =
                tokio::time::timeout(self.open_timeout, self.backend.open(&url, gain, on_end))
                    .await;

            match opened {
                Ok(Ok(handle)) => {
                    let ended_during_open = {
                        let mut inner = self.inner.lock();
                        if inner.completed_early {
                            // El stream terminó antes de que guardáramos el
                            // handle; tratarlo como fallo y seguir con la cola
                            inner.completed_early = false;
                            true
                        } else {
                            inner.handle = Some(handle);
                            inner.now_playing = Some(next.clone());
                            inner.state = PlaybackState::Playing;
                            inner.advancing = false;
                            false
                        }
                    };

                    if ended_during_open {
                        warn!("❌ El stream de {} terminó durante la apertura", next.title);
                        let _ = self.events.send(SessionEvent::TrackFailed {
                            track: next,
                            reason: "el stream terminó durante la apertura".to_string(),
                        });
                        continue;
                    }

                    info!("🎵 Reproduciendo: {}", next.title);
                    let _ = self.events.send(SessionEvent::TrackStarted(next));
                    return;
                }
                Ok(Err(e)) => {
                    warn!("❌ No se pudo abrir el stream de {}: {}", next.title, e);
                    let _ = self.events.send(SessionEvent::TrackFailed {
                        track: next,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!("⏰ Timeout al abrir el stream de {}", next.title);
                    let _ = self.events.send(SessionEvent::TrackFailed {
                        track: next,
                        reason: "timeout al abrir el stream".to_string(),
                    });
                }
            }
        }
    }

    /// Punto de entrada del aviso de fin de stream, cualquiera sea la causa.
    async fn stream_completed(&self, seq: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.stream_seq != seq {
                debug!("Aviso de fin obsoleto (stream {}), ignorado", seq);
                return;
            }
            if inner.handle.take().is_none() {
                // El bucle de avance todavía no guardó el handle de este
                // stream; dejar constancia para que no lo declare Playing
                inner.completed_early = true;
                return;
            }
            inner.now_playing = None;
            inner.state = PlaybackState::Idle;
        }

        self.advance().await;
    }

    pub fn pause(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.state != PlaybackState::Playing {
            return Err(SessionError::NotPlaying);
        }

        if let Some(handle) = &inner.handle {
            if let Err(e) = handle.pause() {
                warn!("⚠️ Error al pausar el stream: {}", e);
            }
        }
        inner.state = PlaybackState::Paused;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    pub fn resume(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock();
        if inner.state != PlaybackState::Paused {
            return Err(SessionError::NotPaused);
        }

        if let Some(handle) = &inner.handle {
            if let Err(e) = handle.resume() {
                warn!("⚠️ Error al reanudar el stream: {}", e);
            }
        }
        inner.state = PlaybackState::Playing;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    /// Detiene el stream actual y avanza al siguiente track en cola.
    pub async fn skip(&self) -> Result<(), SessionError> {
        let handle = {
            let mut inner = self.inner.lock();
            if inner.state == PlaybackState::Idle {
                return Err(SessionError::NothingPlaying);
            }
            // El aviso de fin del stream saltado queda obsoleto
            inner.stream_seq += 1;
            inner.now_playing = None;
            inner.state = PlaybackState::Idle;
            inner.handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.stop() {
                warn!("⚠️ Error al detener el stream: {}", e);
            }
        }

        info!("⏭️ Track saltado");
        self.advance().await;
        Ok(())
    }

    /// Detiene la reproducción y vacía la cola.
    pub fn stop(&self) -> Result<(), SessionError> {
        let handle = {
            let mut inner = self.inner.lock();
            if inner.state == PlaybackState::Idle {
                return Err(SessionError::NothingPlaying);
            }
            inner.stream_seq += 1;
            inner.now_playing = None;
            inner.state = PlaybackState::Idle;
            inner.queue.clear();
            inner.handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.stop() {
                warn!("⚠️ Error al detener el stream: {}", e);
            }
        }

        info!("⏹️ Reproducción detenida y cola vaciada");
        Ok(())
    }

    /// Ajusta el volumen del stream activo; el valor queda guardado y los
    /// próximos streams abren con ese gain.
    pub fn set_volume(&self, level: i64) -> Result<u8, SessionError> {
        if !(0..=100).contains(&level) {
            return Err(SessionError::InvalidVolume);
        }
        let gain = level as f32 / 100.0;

        let mut inner = self.inner.lock();
        let handle = inner.handle.as_ref().ok_or(SessionError::NoActiveStream)?;
        if let Err(e) = handle.set_gain(gain) {
            warn!("⚠️ Error al ajustar el volumen: {}", e);
        }
        inner.gain = gain;

        info!("🔊 Volumen ajustado a {}%", level);
        Ok(level as u8)
    }

    pub fn volume_percent(&self) -> u8 {
        (self.inner.lock().gain * 100.0).round() as u8
    }

    /// Vacía la cola sin tocar la reproducción actual.
    pub fn clear(&self) -> usize {
        self.inner.lock().queue.clear()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            state: inner.state,
            now_playing: inner.now_playing.clone(),
            queue: inner.queue.tracks(),
        }
    }

    /// Desmonte al salir de la guild: detiene todo sin error si ya está ociosa.
    pub fn teardown(&self) {
        let handle = {
            let mut inner = self.inner.lock();
            inner.stream_seq += 1;
            inner.now_playing = None;
            inner.state = PlaybackState::Idle;
            inner.queue.clear();
            inner.handle.take()
        };

        if let Some(handle) = handle {
            let _ = handle.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ResolutionError, StreamError};
    use crate::sources::{CatalogItem, MockPrimaryCatalog, PrimaryHit, SourceKind};
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Backend falso: registra aperturas, permite guionar fallos y disparar
    // el fin de stream manualmente.
    struct FakeBackend {
        script: Mutex<VecDeque<Result<(), String>>>,
        opens: Mutex<Vec<String>>,
        streams: Mutex<Vec<Arc<FakeStream>>>,
        early_finishes: Mutex<usize>,
        hangs: Mutex<usize>,
    }

    struct FakeStream {
        stopped: AtomicBool,
        paused: AtomicBool,
        gain: Mutex<f32>,
        on_end: Mutex<Option<EndNotify>>,
    }

    impl FakeStream {
        /// Simula el fin natural del stream.
        fn finish(&self) {
            if let Some(notify) = self.on_end.lock().take() {
                notify();
            }
        }
    }

    struct FakeHandle(Arc<FakeStream>);

    impl StreamHandle for FakeHandle {
        fn pause(&self) -> Result<(), StreamError> {
            self.0.paused.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn resume(&self) -> Result<(), StreamError> {
            self.0.paused.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), StreamError> {
            self.0.stopped.store(true, Ordering::SeqCst);
            // Igual que songbird: el stop también dispara el aviso de fin
            if let Some(notify) = self.0.on_end.lock().take() {
                notify();
            }
            Ok(())
        }

        fn set_gain(&self, gain: f32) -> Result<(), StreamError> {
            *self.0.gain.lock() = gain;
            Ok(())
        }
    }

    impl FakeBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                opens: Mutex::new(Vec::new()),
                streams: Mutex::new(Vec::new()),
                early_finishes: Mutex::new(0),
                hangs: Mutex::new(0),
            })
        }

        fn fail_next(&self, count: usize) {
            let mut script = self.script.lock();
            for _ in 0..count {
                script.push_back(Err("falla guionada".to_string()));
            }
        }

        /// Las próximas `count` aperturas disparan el fin de stream antes de
        /// devolver el handle, como un driver que muere al conectar.
        fn finish_early_next(&self, count: usize) {
            *self.early_finishes.lock() = count;
        }

        /// Las próximas `count` aperturas nunca terminan.
        fn hang_next(&self, count: usize) {
            *self.hangs.lock() = count;
        }

        fn open_count(&self) -> usize {
            self.opens.lock().len()
        }

        fn last_stream(&self) -> Arc<FakeStream> {
            self.streams.lock().last().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl StreamBackend for FakeBackend {
        async fn open(
            &self,
            url: &str,
            gain: f32,
            on_end: EndNotify,
        ) -> Result<Box<dyn StreamHandle>, StreamError> {
            self.opens.lock().push(url.to_string());

            if let Some(Err(msg)) = self.script.lock().pop_front() {
                return Err(StreamError::new(msg));
            }

            let hang = {
                let mut remaining = self.hangs.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            };
            if hang {
                std::future::pending::<()>().await;
            }

            let early = {
                let mut remaining = self.early_finishes.lock();
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            };
            if early {
                on_end();
                // Dejar correr el aviso antes de devolver el handle
                for _ in 0..10 {
                    tokio::task::yield_now().await;
                }
                let stream = Arc::new(FakeStream {
                    stopped: AtomicBool::new(false),
                    paused: AtomicBool::new(false),
                    gain: Mutex::new(gain),
                    on_end: Mutex::new(None),
                });
                self.streams.lock().push(stream.clone());
                return Ok(Box::new(FakeHandle(stream)));
            }

            let stream = Arc::new(FakeStream {
                stopped: AtomicBool::new(false),
                paused: AtomicBool::new(false),
                gain: Mutex::new(gain),
                on_end: Mutex::new(Some(on_end)),
            });
            self.streams.lock().push(stream.clone());
            Ok(Box::new(FakeHandle(stream)))
        }
    }

    fn youtube_track(title: &str) -> Track {
        Track::from_youtube(
            PrimaryHit {
                title: title.to_string(),
                duration_secs: 180,
                stream_url: format!("https://audio.example/{}", title),
                thumbnail: None,
                uploader: Some("Canal".to_string()),
                page_url: None,
            },
            UserId::new(1),
        )
    }

    fn spotify_track(title: &str) -> Track {
        Track::from_spotify(
            CatalogItem {
                title: title.to_string(),
                artist: "Artista".to_string(),
                album: None,
                duration_secs: 180,
                item_url: format!("https://open.spotify.com/track/{}", title),
                thumbnail: None,
            },
            UserId::new(1),
        )
    }

    fn session_with(
        backend: Arc<FakeBackend>,
        primary: MockPrimaryCatalog,
        capacity: usize,
    ) -> (
        Arc<PlaybackSession>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let resolver = Arc::new(TrackResolver::new(
            Arc::new(primary),
            None,
            Duration::from_secs(5),
        ));
        PlaybackSession::new(resolver, backend, capacity, 0.5, Duration::from_secs(5))
    }

    /// Deja correr las tareas spawneadas por los avisos de fin.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_enqueue_when_idle_starts_playback() {
        let backend = FakeBackend::new();
        let (session, mut events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        let added = session.enqueue(vec![youtube_track("a")]).await.unwrap();

        assert_eq!(added, 1);
        assert_eq!(backend.open_count(), 1);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.now_playing.unwrap().title, "a");
        assert!(snapshot.queue.is_empty());

        match events.try_recv().unwrap() {
            SessionEvent::TrackStarted(track) => assert_eq!(track.title, "a"),
            other => panic!("evento inesperado: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_queue_order_is_fifo() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        session.enqueue(vec![youtube_track("b")]).await.unwrap();
        session.enqueue(vec![youtube_track("c")]).await.unwrap();
        session.enqueue(vec![youtube_track("d")]).await.unwrap();

        let titles: Vec<String> = session
            .snapshot()
            .queue
            .iter()
            .map(|t| t.title.clone())
            .collect();
        assert_eq!(titles, vec!["b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_enqueue_beyond_capacity_rejected_unchanged() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 2);

        // "a" pasa a reproducirse, "b" y "c" quedan en cola llena
        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        session
            .enqueue(vec![youtube_track("b"), youtube_track("c")])
            .await
            .unwrap();

        let err = session.enqueue(vec![youtube_track("d")]).await.unwrap_err();
        assert_eq!(err, SessionError::QueueFull);

        let titles: Vec<String> = session
            .snapshot()
            .queue
            .iter()
            .map(|t| t.title.clone())
            .collect();
        assert_eq!(titles, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_all_open_failures_drain_queue_without_stalling() {
        let backend = FakeBackend::new();
        backend.fail_next(3);
        let (session, mut events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b"), youtube_track("c")])
            .await
            .unwrap();

        // Un intento de apertura por track, aun fallando todos
        assert_eq!(backend.open_count(), 3);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.now_playing.is_none());
        assert!(snapshot.queue.is_empty());

        for expected in ["a", "b", "c"] {
            match events.try_recv().unwrap() {
                SessionEvent::TrackFailed { track, .. } => assert_eq!(track.title, expected),
                other => panic!("evento inesperado: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_failed_track_is_skipped_to_next_playable() {
        let backend = FakeBackend::new();
        backend.fail_next(1);
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("rota"), youtube_track("sana")])
            .await
            .unwrap();

        assert_eq!(backend.open_count(), 2);
        assert_eq!(session.snapshot().now_playing.unwrap().title, "sana");
    }

    #[tokio::test]
    async fn test_natural_end_advances_to_next() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b")])
            .await
            .unwrap();
        assert_eq!(session.snapshot().now_playing.unwrap().title, "a");

        backend.last_stream().finish();
        settle().await;

        assert_eq!(session.snapshot().now_playing.unwrap().title, "b");
        assert_eq!(backend.open_count(), 2);

        backend.last_stream().finish();
        settle().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.now_playing.is_none());
    }

    #[tokio::test]
    async fn test_end_during_open_advances_instead_of_wedging() {
        let backend = FakeBackend::new();
        backend.finish_early_next(1);
        let (session, mut events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b")])
            .await
            .unwrap();
        settle().await;

        // "a" murió durante la apertura: cuenta como fallo y sigue con "b"
        assert_eq!(backend.open_count(), 2);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.now_playing.unwrap().title, "b");

        match events.try_recv().unwrap() {
            SessionEvent::TrackFailed { track, .. } => assert_eq!(track.title, "a"),
            other => panic!("evento inesperado: {:?}", other),
        }
        match events.try_recv().unwrap() {
            SessionEvent::TrackStarted(track) => assert_eq!(track.title, "b"),
            other => panic!("evento inesperado: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_end_during_open_with_empty_queue_goes_idle() {
        let backend = FakeBackend::new();
        backend.finish_early_next(1);
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        settle().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.now_playing.is_none());

        // La sesión no queda trabada: acepta y reproduce el siguiente enqueue
        session.enqueue(vec![youtube_track("b")]).await.unwrap();
        assert_eq!(session.snapshot().now_playing.unwrap().title, "b");
    }

    #[tokio::test]
    async fn test_open_timeout_fails_track_and_advances() {
        let backend = FakeBackend::new();
        backend.hang_next(1);

        let resolver = Arc::new(TrackResolver::new(
            Arc::new(MockPrimaryCatalog::new()),
            None,
            Duration::from_secs(5),
        ));
        let (session, mut events) = PlaybackSession::new(
            resolver,
            backend.clone(),
            10,
            0.5,
            Duration::from_millis(20),
        );

        session
            .enqueue(vec![youtube_track("colgada"), youtube_track("b")])
            .await
            .unwrap();

        // La apertura colgada expira, el track falla y sigue el próximo
        assert_eq!(backend.open_count(), 2);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.now_playing.unwrap().title, "b");

        match events.try_recv().unwrap() {
            SessionEvent::TrackFailed { track, reason } => {
                assert_eq!(track.title, "colgada");
                assert!(reason.contains("timeout"));
            }
            other => panic!("evento inesperado: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_skip_while_idle_is_error_without_state_change() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        assert_eq!(session.skip().await, Err(SessionError::NothingPlaying));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.now_playing.is_none());
        assert_eq!(backend.open_count(), 0);
    }

    #[tokio::test]
    async fn test_skip_stops_current_and_plays_next() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b")])
            .await
            .unwrap();
        let first = backend.last_stream();

        session.skip().await.unwrap();
        settle().await;

        assert!(first.stopped.load(Ordering::SeqCst));
        assert_eq!(session.snapshot().now_playing.unwrap().title, "b");
        // El aviso de fin del stream detenido es obsoleto: no avanza dos veces
        assert_eq!(backend.open_count(), 2);
    }

    #[tokio::test]
    async fn test_pause_resume_restores_same_track_and_stream() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        let stream = backend.last_stream();

        session.pause().unwrap();
        assert_eq!(session.snapshot().state, PlaybackState::Paused);
        assert!(stream.paused.load(Ordering::SeqCst));

        session.resume().unwrap();
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.now_playing.unwrap().title, "a");
        assert!(!stream.paused.load(Ordering::SeqCst));
        // Mismo stream: no se abrió uno nuevo
        assert_eq!(backend.open_count(), 1);
    }

    #[tokio::test]
    async fn test_pause_and_resume_state_guards() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        assert_eq!(session.pause(), Err(SessionError::NotPlaying));

        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        assert_eq!(session.resume(), Err(SessionError::NotPaused));

        session.pause().unwrap();
        assert_eq!(session.pause(), Err(SessionError::NotPlaying));
    }

    #[tokio::test]
    async fn test_stop_clears_queue_and_does_not_advance() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b"), youtube_track("c")])
            .await
            .unwrap();
        let stream = backend.last_stream();

        session.stop().unwrap();
        settle().await;

        assert!(stream.stopped.load(Ordering::SeqCst));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.now_playing.is_none());
        assert!(snapshot.queue.is_empty());
        // El stop no debe abrir el siguiente track
        assert_eq!(backend.open_count(), 1);

        assert_eq!(session.stop(), Err(SessionError::NothingPlaying));
    }

    #[tokio::test]
    async fn test_set_volume_rejects_out_of_range_without_touching_gain() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session.enqueue(vec![youtube_track("a")]).await.unwrap();
        let stream = backend.last_stream();

        assert_eq!(session.set_volume(150), Err(SessionError::InvalidVolume));
        assert_eq!(session.set_volume(-5), Err(SessionError::InvalidVolume));
        assert_eq!(*stream.gain.lock(), 0.5);

        assert_eq!(session.set_volume(80), Ok(80));
        assert_eq!(*stream.gain.lock(), 0.8);
        assert_eq!(session.volume_percent(), 80);
    }

    #[tokio::test]
    async fn test_volume_persists_for_next_stream() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b")])
            .await
            .unwrap();
        session.set_volume(20).unwrap();

        backend.last_stream().finish();
        settle().await;

        // El siguiente stream abre con el gain guardado
        assert_eq!(*backend.last_stream().gain.lock(), 0.2);
    }

    #[tokio::test]
    async fn test_set_volume_without_stream_is_error() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        assert_eq!(session.set_volume(30), Err(SessionError::NoActiveStream));
        // La validación de rango precede al chequeo de stream
        assert_eq!(session.set_volume(300), Err(SessionError::InvalidVolume));
    }

    #[tokio::test]
    async fn test_clear_leaves_playback_untouched() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b"), youtube_track("c")])
            .await
            .unwrap();

        assert_eq!(session.clear(), 2);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.now_playing.unwrap().title, "a");
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_spotify_playlist_enqueue_starts_first_item() {
        let backend = FakeBackend::new();
        // La re-resolución perezosa no encuentra nada: se usa la referencia
        // de Spotify como mejor esfuerzo
        let mut primary = MockPrimaryCatalog::new();
        primary
            .expect_lookup()
            .returning(|_| Err(ResolutionError::NotFound));

        let (session, _events) = session_with(backend.clone(), primary, 10);

        let added = session
            .enqueue(vec![
                spotify_track("uno"),
                spotify_track("dos"),
                spotify_track("tres"),
            ])
            .await
            .unwrap();

        assert_eq!(added, 3);
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        let now = snapshot.now_playing.unwrap();
        assert_eq!(now.source_kind, SourceKind::Spotify);
        assert_eq!(now.title, "uno");
        assert_eq!(snapshot.queue.len(), 2);
        assert_eq!(
            backend.opens.lock()[0],
            "https://open.spotify.com/track/uno"
        );
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent_and_silent() {
        let backend = FakeBackend::new();
        let (session, _events) =
            session_with(backend.clone(), MockPrimaryCatalog::new(), 10);

        session
            .enqueue(vec![youtube_track("a"), youtube_track("b")])
            .await
            .unwrap();

        session.teardown();
        settle().await;

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.queue.is_empty());
        assert_eq!(backend.open_count(), 1);

        // Ya ociosa: no falla
        session.teardown();
    }
}
