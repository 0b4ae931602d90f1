pub mod storage_service;

use std::sync::Arc;

/// The single engine instance shared by every transport adapter.
pub type SharedStorage = Arc<storage_service::StorageService>;
