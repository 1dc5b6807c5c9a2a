// Copyright 2025 The Mapterhorn Viewer Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Remote archive access.
//!
//! Wraps the `pmtiles` reader: one [`AsyncPmTilesReader`] is opened per
//! archive name and reused for subsequent tiles from the same archive, which
//! is where any directory or payload caching lives. This layer adds no
//! retries, timeouts, or fallbacks; failures from the reader propagate
//! unchanged, and a missing tile surfaces as [`FetchError::NotFound`] with
//! the requested coordinate.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use log::debug;
use pmtiles::async_reader::AsyncPmTilesReader;
use pmtiles::{HttpBackend, PmtError};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::resolver::{ResolveError, Resolver, ResolverConfig, TileCoord};

/// Errors from fetching a tile out of a remote archive.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The archive holds no data for this coordinate (ocean, out of
    /// coverage). Carries the requested z/x/y for diagnostics.
    #[error("tile z={zoom} x={x} y={y} not found")]
    NotFound { zoom: u8, x: u32, y: u32 },

    /// The caller abandoned the request before it completed.
    #[error("tile request cancelled")]
    Cancelled,

    /// The tile address failed to parse or validate.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Any lower-level reader failure, propagated unmodified.
    #[error("archive read failed: {0}")]
    Archive(#[from] PmtError),
}

/// Fetches tiles from remote PMTiles archives selected by a [`Resolver`].
pub struct ArchiveFetcher {
    resolver: Resolver,
    client: reqwest::Client,
    readers: RwLock<HashMap<String, Arc<AsyncPmTilesReader<HttpBackend>>>>,
}

impl std::fmt::Debug for ArchiveFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFetcher")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl ArchiveFetcher {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            resolver: Resolver::new(config),
            client: reqwest::Client::new(),
            readers: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Fetch the raw tile payload for `coord`, racing against `cancel`.
    ///
    /// The token is forwarded to the in-flight request: when it fires, the
    /// fetch is dropped and [`FetchError::Cancelled`] is returned.
    pub async fn get_tile(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        tokio::select! {
            () = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.fetch_inner(coord) => result,
        }
    }

    async fn fetch_inner(&self, coord: TileCoord) -> Result<Bytes, FetchError> {
        let resolved = self.resolver.resolve(coord);
        let reader = self.reader_for(&resolved.archive_name, &resolved.archive_url).await?;

        match reader
            .get_tile(coord.zoom(), u64::from(coord.x()), u64::from(coord.y()))
            .await?
        {
            Some(data) if !data.is_empty() => Ok(data),
            _ => Err(FetchError::NotFound {
                zoom: coord.zoom(),
                x: coord.x(),
                y: coord.y(),
            }),
        }
    }

    /// Get or open the reader for one archive.
    async fn reader_for(
        &self,
        name: &str,
        url: &str,
    ) -> Result<Arc<AsyncPmTilesReader<HttpBackend>>, FetchError> {
        if let Some(reader) = self.readers.read().await.get(name) {
            return Ok(Arc::clone(reader));
        }

        debug!("Opening archive {} at {}", name, url);
        let reader = AsyncPmTilesReader::new_with_url(self.client.clone(), url.to_owned()).await?;
        let reader = Arc::new(reader);

        let mut readers = self.readers.write().await;
        // A concurrent open may have won the race; keep the existing one.
        let entry = readers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::clone(&reader));
        Ok(Arc::clone(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let fetcher = ArchiveFetcher::new(ResolverConfig::default());
        let coord = TileCoord::new(14, 3000, 2000).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher.get_tile(coord, &cancel).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[test]
    fn test_fetcher_selects_archives_through_resolver() {
        let fetcher = ArchiveFetcher::new(ResolverConfig::default());
        let resolver = fetcher.resolver();

        for zoom in 0..=12 {
            let coord = TileCoord::new(zoom, 0, 0).unwrap();
            assert_eq!(resolver.resolve(coord).archive_name, "planet");
        }

        let resolved = resolver.resolve(TileCoord::new(14, 3000, 2000).unwrap());
        assert_eq!(resolved.archive_name, "6-11-7");
        assert_eq!(resolved.tile_path, "14/3000/2000.webp");

        let (col, row) = TileCoord::new(20, 1_000_000, 2).unwrap().archive_ancestor();
        assert!(col < 64 && row < 64);
    }

    #[test]
    fn test_debug_omits_reader_state() {
        let fetcher = ArchiveFetcher::new(ResolverConfig::default());
        let repr = format!("{fetcher:?}");
        assert!(repr.contains("ArchiveFetcher"));
        assert!(repr.contains("resolver"));
    }

    #[test]
    fn test_not_found_message_carries_coordinates() {
        let err = FetchError::NotFound { zoom: 14, x: 3000, y: 2000 };
        let message = err.to_string();
        assert!(message.contains("z=14"));
        assert!(message.contains("x=3000"));
        assert!(message.contains("y=2000"));
    }
}
