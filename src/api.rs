//! HTTP API for the chat front end

mod assets;
mod handlers;
mod types;

pub use handlers::create_router;

use crate::executor::Session;
use crate::llm::ChatModel;
use crate::transcript::SeedContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Application state shared across handlers
///
/// Each session owns its transcript exclusively; the per-session mutex
/// serializes submissions so one turn is fully processed before the next.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>>,
    pub model: Arc<dyn ChatModel>,
    pub seed: Arc<SeedContext>,
}

impl AppState {
    pub fn new(model: Arc<dyn ChatModel>, seed: SeedContext) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            model,
            seed: Arc::new(seed),
        }
    }
}
