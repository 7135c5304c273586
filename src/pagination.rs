//! This module defines the common functionality for paging through lists of rows.

use axum::extract::FromRef;
use serde::Deserialize;

use crate::{AppState, Store};

/// Bounds a list query: at most `limit` rows after skipping the first `offset` rows.
///
/// Lists are ordered by ascending ID, so a page is stable as long as no rows
/// are inserted or deleted between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// The maximum number of rows to return.
    pub limit: u32,
    /// The number of leading rows to skip.
    pub offset: u32,
}

impl ListParams {
    /// Create new list parameters.
    pub fn new(limit: u32, offset: u32) -> Self {
        Self { limit, offset }
    }
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
        }
    }
}

/// The config for pagination of the list endpoints.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page size to use when the request does not specify one.
    pub default_limit: u32,
    /// The largest page size a client may request.
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// The query string of the list endpoints, e.g. `?limit=10&offset=20`.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// The requested page size.
    pub limit: Option<u32>,
    /// The requested number of rows to skip.
    pub offset: Option<u32>,
}

impl PaginationConfig {
    /// Turn a request's query into list parameters.
    ///
    /// A missing limit falls back to [PaginationConfig::default_limit], and
    /// the limit is clamped to `1..=max_limit`.
    pub fn list_params(&self, query: &ListQuery) -> ListParams {
        let limit = query
            .limit
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1));

        ListParams::new(limit, query.offset.unwrap_or(0))
    }
}

/// The state needed by the list endpoints.
#[derive(Debug, Clone)]
pub struct ListState {
    /// The handle to the application database.
    pub store: Store,
    /// Bounds the page sizes clients may request.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ListState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}
