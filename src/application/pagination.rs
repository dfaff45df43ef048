//! Keyset pagination over `(timestamp, id)` ordered listings.
//!
//! A cursor is the last row's sort key, tagged with the listing it came from and
//! base64-encoded, e.g. `surveys:1718000000000000000:<uuid>`.

use std::marker::PhantomData;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Listing a cursor belongs to.
pub trait CursorKind {
    const TAG: &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surveys;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Results;

impl CursorKind for Surveys {
    const TAG: &'static str = "surveys";
}

impl CursorKind for Results {
    const TAG: &'static str = "results";
}

/// Position after the last row of a newest-first page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor<K> {
    at: OffsetDateTime,
    id: Uuid,
    kind: PhantomData<K>,
}

/// A creator's surveys by `created_at`.
pub type SurveyCursor = Cursor<Surveys>;
/// A survey's results by `date_submitted`.
pub type ResultCursor = Cursor<Results>;

impl<K: CursorKind> Cursor<K> {
    pub fn new(at: OffsetDateTime, id: Uuid) -> Self {
        Self {
            at,
            id,
            kind: PhantomData,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}:{}:{}", K::TAG, self.at.unix_timestamp_nanos(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let raw = String::from_utf8(bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;

        let mut parts = raw.splitn(3, ':');
        let (Some(tag), Some(nanos), Some(id)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(PaginationError::InvalidCursor("malformed cursor".to_string()));
        };
        if tag != K::TAG {
            return Err(PaginationError::InvalidCursor(format!(
                "cursor belongs to `{tag}`, not `{}`",
                K::TAG
            )));
        }
        let at = nanos
            .parse::<i128>()
            .ok()
            .and_then(|nanos| OffsetDateTime::from_unix_timestamp_nanos(nanos).ok())
            .ok_or_else(|| PaginationError::InvalidCursor("bad timestamp".to_string()))?;
        let id = Uuid::parse_str(id).map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;

        Ok(Self::new(at, id))
    }
}

impl Cursor<Surveys> {
    pub fn created_at(&self) -> OffsetDateTime {
        self.at
    }
}

impl Cursor<Results> {
    pub fn date_submitted(&self) -> OffsetDateTime {
        self.at
    }
}

/// Request for a page of items after an optional cursor.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<C> {
    pub limit: u32,
    pub cursor: Option<C>,
}

impl<C> PageRequest<C> {
    pub fn new(limit: u32, cursor: Option<C>) -> Self {
        Self { limit, cursor }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// Convert every item, keeping the cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}
