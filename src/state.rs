use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::recordings::{ChunkAssembler, RecordingStore};
use crate::signaling::SignalingRelay;
use crate::transcode::TranscodeManager;

/// Application-wide state shared across handlers
pub struct AppState {
    /// Loaded configuration
    pub config: AppConfig,
    /// Signaling relay (owns the connection directory)
    pub relay: SignalingRelay,
    /// Recording path/naming authority
    pub store: Arc<RecordingStore>,
    /// Chunked upload reassembly
    pub assembler: ChunkAssembler,
    /// Background conversion jobs
    pub transcoder: Arc<TranscodeManager>,
    /// Shutdown signal sender
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, shutdown_tx: broadcast::Sender<()>) -> Arc<Self> {
        let store = Arc::new(RecordingStore::new(config.recordings.data_dir.clone()));
        let relay = SignalingRelay::new(&config.signaling);
        let assembler = ChunkAssembler::new(store.clone());
        let transcoder = Arc::new(TranscodeManager::new(config.transcode.clone(), store.clone()));

        Arc::new(Self {
            config,
            relay,
            store,
            assembler,
            transcoder,
            shutdown_tx,
        })
    }

    /// Subscribe to the shutdown signal
    pub fn shutdown_signal(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}
