//! Persisted pairing: which peripherals make up our glasses
//!
//! Stored as pretty JSON so it can be inspected and edited by hand.

use std::path::{Path, PathBuf};

use glasslink_core::{GlassesInfo, Side, SideIdentity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{BleError, BleResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRecord {
    /// Filter the identities below were captured under
    pub search_filter: Option<String>,
    pub left: Option<SideIdentity>,
    pub right: Option<SideIdentity>,
    /// Serial number and decoded frame attributes, once known
    pub glasses: Option<GlassesInfo>,
}

impl PairingRecord {
    pub fn identity(&self, side: Side) -> Option<&SideIdentity> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
        }
    }

    pub fn set_identity(&mut self, side: Side, identity: SideIdentity) {
        match side {
            Side::Left => self.left = Some(identity),
            Side::Right => self.right = Some(identity),
        }
    }

    /// Switch filters, dropping identities captured under a different one
    pub fn set_search_filter(&mut self, filter: Option<String>) {
        if self.search_filter == filter {
            return;
        }
        if let Some(filter) = filter.as_deref() {
            for side in Side::BOTH {
                let stale = self
                    .identity(side)
                    .is_some_and(|identity| !identity.matches_filter(filter));
                if stale {
                    debug!("Forgetting {} identity, it does not match {:?}", side, filter);
                    self.clear_side(side);
                }
            }
        }
        if self.left.is_none() && self.right.is_none() {
            self.glasses = None;
        }
        self.search_filter = filter;
    }

    fn clear_side(&mut self, side: Side) {
        match side {
            Side::Left => self.left = None,
            Side::Right => self.right = None,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.left.is_some() && self.right.is_some()
    }

    pub fn forget(&mut self) {
        *self = Self::default();
    }
}

/// File-backed [`PairingRecord`]; without a path it only lives in memory
#[derive(Debug, Clone, Default)]
pub struct PairingStore {
    path: Option<PathBuf>,
}

impl PairingStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the record; a missing file is an empty record
    pub fn load(&self) -> BleResult<PairingRecord> {
        let Some(path) = &self.path else {
            return Ok(PairingRecord::default());
        };
        if !path.exists() {
            return Ok(PairingRecord::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| BleError::Persistence(format!("Failed to read pairing file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| BleError::Persistence(format!("Failed to parse pairing file: {}", e)))
    }

    pub fn save(&self, record: &PairingRecord) -> BleResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BleError::Persistence(format!("Failed to create pairing directory: {}", e))
            })?;
        }

        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| BleError::Persistence(format!("Failed to serialize pairing: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| BleError::Persistence(format!("Failed to write pairing file: {}", e)))?;
        info!("Saved pairing to {}", path.display());
        Ok(())
    }
}
