//! Hand-rolled test doubles for the vendor player and the progress store.
//!
//! `ScriptedEmbed` plays the role of the page-global player library: tests
//! flip its readiness, push raw [`EmbedEvent`]s, and move the playhead,
//! while the code under test sees only the normal adapter surface.
//! `RecordingStore` wraps the in-memory store with attempt counting,
//! scripted failures, and an artificial write delay for race tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;

use lumio_model::{EmbedId, ProgressRecord, UserId, VideoId};

use crate::adapter::embed::{
    CreatePlayerError, EmbedEvent, EmbedHandle, EmbedLibrary,
    EmbedPlaybackState,
};
use crate::store::{MemoryProgressStore, ProgressStore, StoreError};

#[derive(Debug)]
struct ScriptedInner {
    ready: bool,
    position: Option<f64>,
    duration: Option<f64>,
    sinks: Vec<UnboundedSender<EmbedEvent>>,
    created: usize,
    commands: Vec<String>,
}

/// Scriptable stand-in for the embed player library and its handles.
#[derive(Debug, Clone)]
pub struct ScriptedEmbed {
    inner: Arc<RwLock<ScriptedInner>>,
}

impl Default for ScriptedEmbed {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEmbed {
    /// A library that has not finished loading yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ScriptedInner {
                ready: false,
                position: Some(0.0),
                duration: None,
                sinks: Vec::new(),
                created: 0,
                commands: Vec::new(),
            })),
        }
    }

    /// A library that is immediately ready.
    pub fn ready() -> Self {
        let embed = Self::new();
        embed.set_ready(true);
        embed
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.write().unwrap().ready = ready;
    }

    pub fn set_position(&self, seconds: f64) {
        self.inner.write().unwrap().position = Some(seconds);
    }

    /// Make position queries return nothing, as the real widget does while
    /// it rebuilds.
    pub fn set_position_unavailable(&self) {
        self.inner.write().unwrap().position = None;
    }

    pub fn set_duration(&self, seconds: f64) {
        self.inner.write().unwrap().duration = Some(seconds);
    }

    pub fn created_players(&self) -> usize {
        self.inner.read().unwrap().created
    }

    /// Commands the code under test issued, in order.
    pub fn commands(&self) -> Vec<String> {
        self.inner.read().unwrap().commands.clone()
    }

    pub fn emit_ready(&self, duration: f64) {
        self.set_duration(duration);
        self.emit(EmbedEvent::Ready { duration });
    }

    pub fn emit_state(&self, state: EmbedPlaybackState) {
        self.emit(EmbedEvent::StateChange(state));
    }

    pub fn emit_error(&self, code: i32) {
        self.emit(EmbedEvent::Error(code));
    }

    fn emit(&self, event: EmbedEvent) {
        let inner = self.inner.read().unwrap();
        for sink in &inner.sinks {
            let _ = sink.send(event.clone());
        }
    }

    fn record_command(&self, command: String) {
        self.inner.write().unwrap().commands.push(command);
    }
}

impl EmbedLibrary for ScriptedEmbed {
    fn is_ready(&self) -> bool {
        self.inner.read().unwrap().ready
    }

    fn create_player(
        &self,
        _embed_id: &EmbedId,
        start_seconds: u32,
        events: UnboundedSender<EmbedEvent>,
    ) -> Result<Box<dyn EmbedHandle>, CreatePlayerError> {
        let mut inner = self.inner.write().unwrap();
        inner.created += 1;
        inner.sinks.push(events);
        if inner.position.is_some() {
            inner.position = Some(start_seconds as f64);
        }
        Ok(Box::new(ScriptedHandle {
            library: self.clone(),
        }))
    }
}

#[derive(Debug)]
struct ScriptedHandle {
    library: ScriptedEmbed,
}

impl EmbedHandle for ScriptedHandle {
    fn current_time(&self) -> Option<f64> {
        self.library.inner.read().unwrap().position
    }

    fn duration(&self) -> Option<f64> {
        self.library.inner.read().unwrap().duration
    }

    fn play(&self) {
        self.library.record_command("play".to_string());
    }

    fn pause(&self) {
        self.library.record_command("pause".to_string());
    }

    fn seek_to(&self, seconds: f64) {
        self.library
            .record_command(format!("seek:{}", seconds as u32));
    }

    fn mute(&self) {
        self.library.record_command("mute".to_string());
    }

    fn unmute(&self) {
        self.library.record_command("unmute".to_string());
    }

    fn destroy(&self) {
        self.library.record_command("destroy".to_string());
    }
}

/// Store wrapper that records every upsert attempt and can inject scripted
/// failures or a per-write delay.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryProgressStore,
    attempts: AtomicUsize,
    positions: Mutex<Vec<u32>>,
    delay: Mutex<Option<Duration>>,
    scripted_failures: Mutex<VecDeque<StoreError>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the backing store with an existing record.
    pub async fn seed(&self, record: &ProgressRecord) {
        self.inner
            .upsert(record)
            .await
            .expect("memory store never fails");
    }

    /// Delay applied inside every upsert before it lands. Combined with a
    /// paused tokio clock this widens the in-flight window deterministically.
    pub fn set_write_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Queue an error for the next upsert attempt; later attempts succeed
    /// again once the queue drains.
    pub fn fail_next(&self, error: StoreError) {
        self.scripted_failures.lock().unwrap().push_back(error);
    }

    /// Total upsert attempts, including failed ones.
    pub fn upsert_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Positions of upserts that reached the backing store, in order.
    pub fn landed_positions(&self) -> Vec<u32> {
        self.positions.lock().unwrap().clone()
    }

    pub fn get(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Option<ProgressRecord> {
        self.inner.get(user_id, video_id)
    }
}

#[async_trait]
impl ProgressStore for RecordingStore {
    async fn load(
        &self,
        user_id: UserId,
        video_id: VideoId,
    ) -> Result<Option<ProgressRecord>, StoreError> {
        self.inner.load(user_id, video_id).await
    }

    async fn upsert(&self, record: &ProgressRecord) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.scripted_failures.lock().unwrap().pop_front()
        {
            return Err(error);
        }

        self.positions
            .lock()
            .unwrap()
            .push(record.position_seconds);
        self.inner.upsert(record).await
    }
}
