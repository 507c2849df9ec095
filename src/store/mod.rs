//! State Store Adapter
//!
//! Reads and writes the single controller state document through a
//! `ParameterStore`:
//! - absent document → fresh initial state
//! - legacy document → migrated to the current shape
//! - unreadable document → error (never silently reset)

mod errors;
mod file;
mod memory;
mod migrate;

pub use errors::{StoreError, StoreResult};
pub use file::FileParameterStore;
pub use memory::MemoryParameterStore;
pub use migrate::{decode, MigrationContext};

use tracing::{info, warn};

use crate::config::ControllerConfig;
use crate::observability::ControllerEvent;
use crate::service::{BoxFuture, ServiceResult};
use crate::state::ControllerState;

/// Durable key/value parameter store.
pub trait ParameterStore: Send + Sync {
    /// Read a value; `None` when the key does not exist.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ServiceResult<Option<String>>>;

    /// Write a value, overwriting any previous one.
    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, ServiceResult<()>>;
}

/// How a loaded state came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOrigin {
    /// No document existed; defaults were used
    Initialized,
    /// Document was in the current shape
    Loaded,
    /// Document was in an older shape and was migrated
    Migrated,
}

impl StateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Loaded => "loaded",
            Self::Migrated => "migrated",
        }
    }
}

/// Controller state read from the store.
#[derive(Debug, Clone)]
pub struct LoadedState {
    pub state: ControllerState,
    pub origin: StateOrigin,
}

/// Reads and writes the controller state document.
pub struct StateStore<'a> {
    store: &'a dyn ParameterStore,
    config: &'a ControllerConfig,
}

impl<'a> StateStore<'a> {
    pub fn new(store: &'a dyn ParameterStore, config: &'a ControllerConfig) -> Self {
        Self { store, config }
    }

    /// Load the state, initializing or migrating as needed.
    pub async fn load(&self) -> StoreResult<LoadedState> {
        let key = self.config.state_param_name.as_str();

        let raw = match self.store.get(key).await? {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => {
                info!(
                    event = ControllerEvent::StateInitialized.as_str(),
                    key, "no persisted state; starting steady on primary"
                );
                return Ok(LoadedState {
                    state: ControllerState::initial(&self.config.primary_db_id),
                    origin: StateOrigin::Initialized,
                });
            }
        };

        let ctx = MigrationContext {
            primary_db_id: &self.config.primary_db_id,
            failback_db_id: &self.config.failback_db_id,
        };
        let (state, migrated) = decode(&raw, ctx)?;

        if migrated {
            warn!(
                event = ControllerEvent::StateMigrated.as_str(),
                key,
                phase = %state.phase,
                active = %state.active,
                primary_writer_id = %state.primary_writer_id,
                "migrated legacy state document"
            );
        }

        Ok(LoadedState {
            state,
            origin: if migrated {
                StateOrigin::Migrated
            } else {
                StateOrigin::Loaded
            },
        })
    }

    /// Persist the state document (compact JSON).
    pub async fn save(&self, state: &ControllerState) -> StoreResult<()> {
        let raw = serde_json::to_string(state).map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.store.put(&self.config.state_param_name, &raw).await?;
        Ok(())
    }
}
