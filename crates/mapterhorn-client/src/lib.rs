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

//! Client library for the Mapterhorn elevation tile service.
//!
//! The Mapterhorn dataset is served as remote PMTiles archives: a single
//! `planet` archive covers every tile up to zoom 12, and tiles above that are
//! spatially partitioned into one archive per zoom-6 tile. This library
//! provides two layers that can be used independently or composed:
//!
//! - **Resolver layer**: pure translation from a `mapterhorn://{z}/{x}/{y}`
//!   tile address to the archive name, archive URL, and in-archive tile path
//! - **Archive layer**: delegated fetch through the `pmtiles` reader, with
//!   per-archive reader reuse and cancellation forwarding
//!
//! # Quick Start
//!
//! Use the [`TileClient`] type for full-stack operation:
//!
//! ```no_run
//! use mapterhorn_client::{ResolverConfig, TileClient, TileCoord};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TileClient::new(ResolverConfig::default());
//!     let coord = TileCoord::new(14, 3000, 2000)?;
//!
//!     let cancel = CancellationToken::new();
//!     let payload = client.get_tile(coord, &cancel).await?;
//!     println!("got {} bytes", payload.len());
//!     Ok(())
//! }
//! ```
//!
//! # Resolver Layer Only
//!
//! ```
//! use mapterhorn_client::{Resolver, ResolverConfig, TileCoord};
//!
//! let resolver = Resolver::new(ResolverConfig::default());
//! let coord = TileCoord::from_scheme_url("mapterhorn", "mapterhorn://14/3000/2000").unwrap();
//! assert_eq!(resolver.archive_name(coord), "6-11-7");
//! ```

pub mod archive;
pub mod resolver;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

pub use archive::{ArchiveFetcher, FetchError};
pub use resolver::{
    ResolveError, ResolvedTile, Resolver, ResolverConfig, TileCoord, ARCHIVE_ZOOM, MAX_ZOOM,
    PLANET_ARCHIVE, PLANET_MAX_ZOOM,
};

/// Full-stack tile client wiring the resolver and archive layers together.
#[derive(Debug)]
pub struct TileClient {
    fetcher: ArchiveFetcher,
}

impl TileClient {
    /// Create a client for the archives described by `config`.
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            fetcher: ArchiveFetcher::new(config),
        }
    }

    /// The resolver this client routes requests through.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        self.fetcher.resolver()
    }

    /// Fetch one tile, parsed from a custom-scheme URL.
    ///
    /// This is the entry point a rendering engine's scheme handler calls:
    /// the URL is validated, resolved to an archive address, and the fetch is
    /// delegated with the cancellation token forwarded.
    pub async fn get_tile_url(
        &self,
        scheme: &str,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        let coord = TileCoord::from_scheme_url(scheme, url)?;
        self.get_tile(coord, cancel).await
    }

    /// Fetch one tile by coordinate.
    pub async fn get_tile(
        &self,
        coord: TileCoord,
        cancel: &CancellationToken,
    ) -> Result<Bytes, FetchError> {
        self.fetcher.get_tile(coord, cancel).await
    }
}
