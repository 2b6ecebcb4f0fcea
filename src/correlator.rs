//! Shared store of the latest decoded response per request id.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::model::RequestId;
use crate::wire::{GenerateContentResponse, SafetyRating, UsageMetadata};

/// Maps a [`RequestId`] to the most recent response snapshot seen for it.
///
/// Each `put` replaces the previous snapshot for the id; nothing is merged.
/// A streamed call therefore always exposes the statistics of its latest
/// event. Entries live until [`ResponseCorrelator::clear`].
///
/// Safe to share between concurrent calls; writes for the same id race and
/// the last one wins.
#[derive(Debug, Default)]
pub struct ResponseCorrelator {
    responses: RwLock<HashMap<RequestId, GenerateContentResponse>>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `response` as the latest snapshot for `id`.
    pub fn put(&self, id: RequestId, response: GenerateContentResponse) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, response);
    }

    /// Latest snapshot for `id`, if any was recorded since the last clear.
    pub fn get(&self, id: RequestId) -> Option<GenerateContentResponse> {
        self.responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn usage_metadata(&self, id: RequestId) -> Option<UsageMetadata> {
        self.responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|response| response.usage_metadata)
    }

    /// Safety ratings across all candidates; empty for an unknown id.
    pub fn safety_ratings(&self, id: RequestId) -> Vec<SafetyRating> {
        self.responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .map(GenerateContentResponse::safety_ratings)
            .unwrap_or_default()
    }

    /// Drop every entry. In-flight streams repopulate their entry on their
    /// next event.
    pub fn clear(&self) {
        self.responses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.responses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
