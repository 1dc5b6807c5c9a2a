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

//! Tile address resolution.
//!
//! The Mapterhorn dataset is published as a set of remote PMTiles archives:
//! one `planet` archive holding every tile up to zoom 12, and one archive per
//! zoom-6 tile for everything above that. This module maps an abstract
//! `mapterhorn://{z}/{x}/{y}` tile request to the archive holding it and the
//! tile path inside that archive.
//!
//! Resolution is a pure function of the coordinate and a [`ResolverConfig`];
//! there is no registry, no caching, and no I/O here.

use thiserror::Error;

/// Zoom level at which the dataset is partitioned into per-region archives.
pub const ARCHIVE_ZOOM: u8 = 6;

/// Highest zoom level served by the single `planet` archive.
pub const PLANET_MAX_ZOOM: u8 = 12;

/// Name of the whole-dataset archive used for low zoom levels.
pub const PLANET_ARCHIVE: &str = "planet";

/// Highest zoom level a coordinate may carry. Keeps `2^zoom` and the
/// ancestor shift within `u32`.
pub const MAX_ZOOM: u8 = 30;

/// Errors from parsing or validating a tile address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("URL '{url}' does not start with '{scheme}://'")]
    UnexpectedScheme { scheme: String, url: String },

    #[error("expected 3 path segments (z/x/y), got {count} in '{path}'")]
    SegmentCount { count: usize, path: String },

    #[error("invalid value for {axis}: '{value}'")]
    InvalidNumber { axis: &'static str, value: String },

    #[error("zoom {0} exceeds maximum supported zoom {MAX_ZOOM}")]
    ZoomTooLarge(u8),

    #[error("{axis}={value} is out of range for zoom {zoom} (must be < 2^{zoom})")]
    OutOfRange { axis: &'static str, value: u32, zoom: u8 },
}

/// A tile address: zoom level plus column (`x`) and row (`y`).
///
/// Construction validates that both axes lie in `[0, 2^zoom)`, so a value of
/// this type is always a well-formed slippy-map coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    zoom: u8,
    x: u32,
    y: u32,
}

impl TileCoord {
    /// Create a validated tile coordinate.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, ResolveError> {
        if zoom > MAX_ZOOM {
            return Err(ResolveError::ZoomTooLarge(zoom));
        }
        let side = 1u32 << zoom;
        if x >= side {
            return Err(ResolveError::OutOfRange { axis: "x", value: x, zoom });
        }
        if y >= side {
            return Err(ResolveError::OutOfRange { axis: "y", value: y, zoom });
        }
        Ok(Self { zoom, x, y })
    }

    /// Parse a coordinate from a custom-scheme URL such as
    /// `mapterhorn://14/3000/2000`.
    pub fn from_scheme_url(scheme: &str, url: &str) -> Result<Self, ResolveError> {
        let prefix = format!("{scheme}://");
        let Some(path) = url.strip_prefix(&prefix) else {
            return Err(ResolveError::UnexpectedScheme {
                scheme: scheme.to_owned(),
                url: url.to_owned(),
            });
        };

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() != 3 {
            return Err(ResolveError::SegmentCount {
                count: segments.len(),
                path: path.to_owned(),
            });
        }

        let parse = |axis: &'static str, value: &str| -> Result<u32, ResolveError> {
            value.parse().map_err(|_| ResolveError::InvalidNumber {
                axis,
                value: value.to_owned(),
            })
        };

        let zoom = parse("zoom", segments[0])?;
        if zoom > u32::from(MAX_ZOOM) {
            return Err(ResolveError::ZoomTooLarge(zoom.min(255) as u8));
        }
        let x = parse("x", segments[1])?;
        let y = parse("y", segments[2])?;

        Self::new(zoom as u8, x, y)
    }

    #[must_use]
    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    #[must_use]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    /// The zoom-6 tile that spatially contains this tile.
    ///
    /// Only meaningful for `zoom > ARCHIVE_ZOOM`; at or below that the tile
    /// is its own ancestor or coarser.
    #[must_use]
    pub fn archive_ancestor(&self) -> (u32, u32) {
        if self.zoom <= ARCHIVE_ZOOM {
            return (self.x, self.y);
        }
        let shift = self.zoom - ARCHIVE_ZOOM;
        (self.x >> shift, self.y >> shift)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Configuration for address resolution.
///
/// Handed explicitly to [`Resolver::new`]; there is no process-wide default.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// HTTPS base under which the archives live, without trailing slash.
    pub base_url: String,
    /// File extension of the embedded archive format.
    pub archive_extension: String,
    /// File extension of the image tiles inside the archives.
    pub image_extension: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://download.mapterhorn.com".to_owned(),
            archive_extension: "pmtiles".to_owned(),
            image_extension: "webp".to_owned(),
        }
    }
}

/// A fully resolved tile address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTile {
    /// Name of the archive holding the tile.
    pub archive_name: String,
    /// HTTPS URL of the archive file.
    pub archive_url: String,
    /// Path of the tile inside the archive, e.g. `14/3000/2000.webp`.
    pub tile_path: String,
}

impl ResolvedTile {
    /// The combined address understood by the archive reader:
    /// `pmtiles://<archive-url>/<tile-path>`.
    #[must_use]
    pub fn address(&self) -> String {
        format!("pmtiles://{}/{}", self.archive_url, self.tile_path)
    }
}

/// Maps tile coordinates to archive addresses.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    #[must_use]
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Name of the archive serving the given coordinate.
    ///
    /// Tiles at zoom 12 and below come from the `planet` archive; above that
    /// the archive is selected by the tile's zoom-6 ancestor.
    #[must_use]
    pub fn archive_name(&self, coord: TileCoord) -> String {
        if coord.zoom() <= PLANET_MAX_ZOOM {
            return PLANET_ARCHIVE.to_owned();
        }
        let (col, row) = coord.archive_ancestor();
        format!("{ARCHIVE_ZOOM}-{col}-{row}")
    }

    /// Resolve a coordinate to the archive URL and in-archive tile path.
    #[must_use]
    pub fn resolve(&self, coord: TileCoord) -> ResolvedTile {
        let archive_name = self.archive_name(coord);
        let archive_url = format!(
            "{}/{}.{}",
            self.config.base_url, archive_name, self.config.archive_extension
        );
        let tile_path = format!("{}.{}", coord, self.config.image_extension);
        ResolvedTile {
            archive_name,
            archive_url,
            tile_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(zoom: u8, x: u32, y: u32) -> TileCoord {
        TileCoord::new(zoom, x, y).unwrap()
    }

    #[test]
    fn test_planet_archive_at_low_zoom() {
        let resolver = Resolver::default();
        assert_eq!(resolver.archive_name(coord(0, 0, 0)), "planet");
        assert_eq!(resolver.archive_name(coord(6, 40, 25)), "planet");
        assert_eq!(resolver.archive_name(coord(12, 1000, 800)), "planet");
    }

    #[test]
    fn test_partitioned_archive_above_cutoff() {
        let resolver = Resolver::default();
        // z=13 exercises the partitioned branch with shift = 7
        assert_eq!(
            resolver.archive_name(coord(13, 2000, 1600)),
            format!("6-{}-{}", 2000u32 >> 7, 1600u32 >> 7)
        );
    }

    #[test]
    fn test_archive_ancestor_is_valid_zoom6_coordinate() {
        for &(z, x, y) in &[(13u8, 8191u32, 0u32), (14, 16383, 16383), (16, 40000, 1)] {
            let (col, row) = coord(z, x, y).archive_ancestor();
            assert!(col < 64, "col {col} out of range at zoom 6");
            assert!(row < 64, "row {row} out of range at zoom 6");
        }
    }

    #[test]
    fn test_same_ancestor_shares_archive() {
        let resolver = Resolver::default();
        // All zoom-14 tiles under ancestor (11, 7) share one archive.
        let base = resolver.archive_name(coord(14, 11 << 8, 7 << 8));
        assert_eq!(resolver.archive_name(coord(14, (11 << 8) + 255, (7 << 8) + 255)), base);
        assert_eq!(resolver.archive_name(coord(14, (11 << 8) + 17, (7 << 8) + 200)), base);
        // A different ancestor never shares it.
        assert_ne!(resolver.archive_name(coord(14, 12 << 8, 7 << 8)), base);
        assert_ne!(resolver.archive_name(coord(14, 11 << 8, 8 << 8)), base);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = Resolver::default();
        let c = coord(14, 3000, 2000);
        assert_eq!(resolver.resolve(c).address(), resolver.resolve(c).address());
    }

    #[test]
    fn test_end_to_end_address() {
        let resolver = Resolver::default();
        let resolved = resolver.resolve(coord(14, 3000, 2000));
        assert_eq!(resolved.archive_name, "6-11-7");
        assert_eq!(
            resolved.address(),
            "pmtiles://https://download.mapterhorn.com/6-11-7.pmtiles/14/3000/2000.webp"
        );
    }

    #[test]
    fn test_custom_config() {
        let resolver = Resolver::new(ResolverConfig {
            base_url: "https://tiles.example.org/dem".to_owned(),
            archive_extension: "pmtiles".to_owned(),
            image_extension: "png".to_owned(),
        });
        let resolved = resolver.resolve(coord(5, 10, 20));
        assert_eq!(
            resolved.address(),
            "pmtiles://https://tiles.example.org/dem/planet.pmtiles/5/10/20.png"
        );
    }

    #[test]
    fn test_parse_scheme_url() {
        let c = TileCoord::from_scheme_url("mapterhorn", "mapterhorn://14/3000/2000").unwrap();
        assert_eq!((c.zoom(), c.x(), c.y()), (14, 3000, 2000));
    }

    #[test]
    fn test_parse_rejects_wrong_scheme() {
        let err = TileCoord::from_scheme_url("mapterhorn", "https://14/3000/2000").unwrap_err();
        assert!(matches!(err, ResolveError::UnexpectedScheme { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        assert!(matches!(
            TileCoord::from_scheme_url("mapterhorn", "mapterhorn://14/3000").unwrap_err(),
            ResolveError::SegmentCount { count: 2, .. }
        ));
        assert!(matches!(
            TileCoord::from_scheme_url("mapterhorn", "mapterhorn://14/abc/2000").unwrap_err(),
            ResolveError::InvalidNumber { axis: "x", .. }
        ));
    }

    #[test]
    fn test_rejects_out_of_range_coordinates() {
        assert!(matches!(
            TileCoord::new(3, 8, 0).unwrap_err(),
            ResolveError::OutOfRange { axis: "x", value: 8, zoom: 3 }
        ));
        assert!(matches!(
            TileCoord::new(3, 0, 9).unwrap_err(),
            ResolveError::OutOfRange { axis: "y", value: 9, zoom: 3 }
        ));
        assert!(TileCoord::new(31, 0, 0).is_err());
    }

    #[test]
    fn test_boundary_zooms_exercise_both_branches() {
        let resolver = Resolver::default();
        assert_eq!(resolver.archive_name(coord(12, 1000, 800)), "planet");
        let name = resolver.archive_name(coord(13, 2000, 1600));
        assert_eq!(name, "6-15-12");
    }
}
