//! Construction of the cached land, canal and obstacle-mask datasets.
//!
//! Land records are processed into one tile each, in parallel; a tile that
//! already exists on disk is never rebuilt. The tiles are then merged
//! single-threaded in file-name order so the final dataset is reproducible.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use geo::{
    Area, BooleanOps, Centroid, Coord, Intersects, LineString, MultiLineString, MultiPolygon,
    Point, Polygon,
};
use rayon::prelude::*;

use crate::config::SailConfig;
use crate::engine::{union_all, union_polygons, BufferParams, GeometryEngine};
use crate::errors::{GstError, Result};
use crate::io;
use crate::models::{Category, Record, Resolution, Shape};
use crate::naming::{tile_file_name, StoreLayout};
use crate::provider::DatasetProvider;
use crate::rings::remove_interior_rings;
use crate::spatial::{bearing, offset_by_bearing};

/// Directions sampled when buffering the start point into a local extent.
const EXTENT_ANGULAR_RESOLUTION: usize = 361;

/// Canal ends are extended by this many buffer distances before cutting.
const CANAL_EXTENSION_FACTOR: f64 = 6.0;

/// Parameters of one land dataset.
#[derive(Debug, Clone, Default)]
pub struct LandRequest {
    /// Outward buffer applied to every land polygon, in meters.
    pub buffer_m: f64,
    /// Corridors removed from the land.
    pub canal_cuts: Option<MultiPolygon<f64>>,
    /// Land outside this extent is ignored.
    pub extent: Option<MultiPolygon<f64>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TileStats {
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileOutcome {
    Created,
    Existing,
    Skipped,
}

/// A land dataset and the tile work done to produce it.
#[derive(Debug, Clone)]
pub struct LandBuild {
    pub lands: MultiPolygon<f64>,
    pub tiles: TileStats,
}

impl LandBuild {
    /// False when the dataset holds no land at the configured resolution.
    pub fn found_land(&self) -> bool {
        !self.lands.0.is_empty()
    }
}

/// Everything a run needs from the dataset cache.
#[derive(Debug, Clone)]
pub struct ObstacleDatasets {
    /// Buffered, canal-cut land as individual polygons.
    pub mask: Vec<Polygon<f64>>,
    pub canals: MultiLineString<f64>,
}

pub struct ObstacleBuilder<'a> {
    provider: &'a dyn DatasetProvider,
    engine: &'a dyn GeometryEngine,
    config: &'a SailConfig,
    threads: Option<usize>,
}

impl<'a> ObstacleBuilder<'a> {
    pub fn new(
        provider: &'a dyn DatasetProvider,
        engine: &'a dyn GeometryEngine,
        config: &'a SailConfig,
    ) -> Self {
        Self {
            provider,
            engine,
            config,
            threads: None,
        }
    }

    /// Bound the tile worker pool; `None` uses every available core.
    pub fn threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    fn buffer_params(&self) -> BufferParams {
        BufferParams::new(self.config.angular_resolution, self.config.tolerance_deg)
            .fill(self.config.fill_deg())
    }

    /// Build (or load) a land dataset at `out_path`, tiling into `tile_dir`.
    pub fn build_lands(
        &self,
        out_path: &Path,
        tile_dir: &Path,
        request: &LandRequest,
    ) -> Result<LandBuild> {
        if out_path.exists() {
            tracing::debug!(path = %out_path.display(), "land dataset already built");
            return Ok(LandBuild {
                lands: io::load_wkb_gz(out_path)?.to_multi_polygon()?,
                tiles: TileStats::default(),
            });
        }

        let started = Instant::now();
        tracing::info!(path = %out_path.display(), "making land dataset");
        fs::create_dir_all(tile_dir).map_err(GstError::io(tile_dir))?;

        let mut records = self.provider.records(Category::Land, self.config.resolution)?;
        if self.config.detailed {
            records.extend(
                self.provider
                    .records(Category::MinorIslands, self.config.resolution)?,
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or(0))
            .build()?;
        let outcomes = pool.install(|| {
            records
                .par_iter()
                .enumerate()
                .map(|(index, record)| self.build_tile(index, record, tile_dir, request))
                .collect::<Result<Vec<_>>>()
        })?;

        let mut tiles = TileStats::default();
        for outcome in outcomes {
            match outcome {
                TileOutcome::Created => tiles.created += 1,
                TileOutcome::Existing => tiles.existing += 1,
                TileOutcome::Skipped => tiles.skipped += 1,
            }
        }
        tracing::info!(
            created = tiles.created,
            existing = tiles.existing,
            skipped = tiles.skipped,
            "land tiles ready"
        );

        let lands = self.merge_tiles(tile_dir)?;
        if lands.0.is_empty() {
            tracing::warn!(
                resolution = %self.config.resolution,
                "no land at this resolution"
            );
        }
        let shape = Shape::MultiPolygon(lands.clone());
        io::save_wkb_gz(out_path, &shape)?;
        io::save_geojson(&geojson_path(out_path), &shape)?;
        tracing::info!(
            polygons = lands.0.len(),
            elapsed_s = started.elapsed().as_secs_f64(),
            "saved land dataset"
        );
        Ok(LandBuild { lands, tiles })
    }

    fn build_tile(
        &self,
        index: usize,
        record: &Record,
        tile_dir: &Path,
        request: &LandRequest,
    ) -> Result<TileOutcome> {
        if record.shape.is_empty() {
            tracing::warn!(index, "skipping empty land record");
            return Ok(TileOutcome::Skipped);
        }
        if !record.shape.is_polygonal() {
            return Err(GstError::unexpected(
                "Polygon or MultiPolygon",
                record.shape.kind().to_string(),
            ));
        }

        let mut shape = record.shape.clone();
        let problems = self.engine.check(&shape);
        if !problems.is_empty() {
            shape = self.engine.repair(&shape)?;
            if shape.is_empty() || !self.engine.check(&shape).is_empty() {
                tracing::warn!(index, problems = %problems.join("; "), "skipping invalid land record");
                return Ok(TileOutcome::Skipped);
            }
        }

        let land = shape.to_multi_polygon()?;
        let Some(centroid) = land.centroid() else {
            tracing::warn!(index, "skipping land record without a centroid");
            return Ok(TileOutcome::Skipped);
        };
        let path = tile_dir.join(tile_file_name(
            centroid.x(),
            centroid.y(),
            land.unsigned_area(),
        ));
        if path.exists() {
            return Ok(TileOutcome::Existing);
        }

        let mut polygons = land.0;
        if let Some(extent) = &request.extent {
            polygons = polygons
                .into_iter()
                .filter(|p| extent.intersects(p))
                .flat_map(|p| MultiPolygon::new(vec![p]).intersection(extent).0)
                .collect();
        }

        let params = self.buffer_params();
        let mut pieces = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            let mut piece = Shape::Polygon(polygon);
            if request.buffer_m > 0.0 {
                piece = self.engine.buffer(&piece, request.buffer_m, &params)?;
            }
            if let Some(cuts) = &request.canal_cuts {
                piece = self
                    .engine
                    .difference(&piece, &Shape::MultiPolygon(cuts.clone()))?;
            }
            pieces.push(piece.to_multi_polygon()?);
        }

        let tile = self.engine.simplify(
            &Shape::MultiPolygon(union_all(pieces)),
            self.config.tolerance_deg,
        );
        io::save_wkb_gz(&path, &tile)?;
        Ok(TileOutcome::Created)
    }

    fn merge_tiles(&self, tile_dir: &Path) -> Result<MultiPolygon<f64>> {
        let mut names: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(tile_dir).map_err(GstError::io(tile_dir))? {
            let entry = entry.map_err(GstError::io(tile_dir))?;
            if entry.file_name().to_string_lossy().ends_with(".wkb.gz") {
                names.push(entry.path());
            }
        }
        names.sort();

        let mut polygons = Vec::new();
        for path in &names {
            polygons.extend(io::load_wkb_gz(path)?.polygons());
        }
        tracing::debug!(tiles = names.len(), polygons = polygons.len(), "merging land tiles");

        let tolerance = self.config.tolerance_deg;
        let mut lands = remove_interior_rings(&union_polygons(polygons));
        lands = self
            .engine
            .simplify(&Shape::MultiPolygon(lands), tolerance)
            .to_multi_polygon()?;

        let simplify = self.config.simplify_deg();
        if simplify > 0.0 {
            let simplified = self.engine.simplify(&Shape::MultiPolygon(lands), simplify);
            lands = remove_interior_rings(&simplified.to_multi_polygon()?);
        }
        Ok(lands)
    }

    /// Build (or load) the named-canal dataset at `out_path`.
    pub fn build_canals(&self, out_path: &Path) -> Result<MultiLineString<f64>> {
        if out_path.exists() {
            return io::load_wkb_gz(out_path)?.to_multi_line_string();
        }

        let names = self.config.canal_names();
        if names.is_empty() {
            return Ok(MultiLineString::new(Vec::new()));
        }

        tracing::info!(path = %out_path.display(), "making canal dataset");
        let records = self
            .provider
            .records(Category::RiversLakeCenterlines, Resolution::Full)?;

        let mut canals = Vec::new();
        for name in &names {
            let mut pieces = Vec::new();
            for record in records
                .iter()
                .filter(|r| r.attribute_str("name") == Some(name.as_str()))
            {
                pieces.extend(
                    record
                        .shape
                        .to_multi_line_string()?
                        .0
                        .into_iter()
                        .filter(|ls| ls.0.len() >= 2),
                );
            }
            match join_north_to_south(pieces) {
                Some(line) => canals.push(line),
                None => tracing::warn!(canal = %name, "canal not found in dataset"),
            }
        }

        let lines = Shape::MultiLineString(MultiLineString::new(canals));
        let lines = self.engine.simplify(&lines, self.config.tolerance_deg);
        let lines = self.engine.simplify(&lines, self.config.simplify_deg());
        io::save_wkb_gz(out_path, &lines)?;
        io::save_geojson(&geojson_path(out_path), &lines)?;
        lines.to_multi_line_string()
    }

    /// Corridor polygons that open every canal through buffered land.
    pub fn canal_cuts(
        &self,
        canals: &MultiLineString<f64>,
        distance_m: f64,
    ) -> Result<MultiPolygon<f64>> {
        let params = self.buffer_params().keep_interiors(true);
        let mut parts = Vec::with_capacity(canals.0.len());
        for line in &canals.0 {
            let extended = extrapolate(line, CANAL_EXTENSION_FACTOR * distance_m);
            let corridor = self
                .engine
                .buffer(&Shape::LineString(extended), distance_m, &params)?;
            parts.push(corridor.to_multi_polygon()?);
        }
        Ok(union_all(parts))
    }

    /// Build every cached dataset for the configuration and load the mask.
    pub fn prepare(&self, layout: &StoreLayout) -> Result<ObstacleDatasets> {
        let canals = self.build_canals(&layout.canals())?;

        self.build_lands(
            &layout.unbuffered_lands(),
            &layout.unbuffered_tiles(),
            &LandRequest::default(),
        )?;

        let canal_cuts = if canals.0.is_empty() {
            None
        } else {
            Some(self.canal_cuts(&canals, self.config.precision_m)?)
        };
        let extent = if self.config.local && !self.config.covers_globe() {
            let start = Shape::Point(Point::new(self.config.lon, self.config.lat));
            let params =
                BufferParams::new(EXTENT_ANGULAR_RESOLUTION, self.config.tolerance_deg).fill(1.0);
            let reach = self.config.max_distance_m() + self.config.precision_m;
            Some(self.engine.buffer(&start, reach, &params)?.to_multi_polygon()?)
        } else {
            None
        };

        let mask = self.build_lands(
            &layout.mask(),
            &layout.mask_tiles(),
            &LandRequest {
                buffer_m: self.config.precision_m,
                canal_cuts,
                extent,
            },
        )?;

        Ok(ObstacleDatasets {
            mask: mask.lands.0,
            canals,
        })
    }
}

fn geojson_path(path: &Path) -> PathBuf {
    path.with_extension("").with_extension("geojson")
}

fn top(line: &LineString<f64>) -> f64 {
    line.0.iter().map(|c| c.y).fold(f64::NEG_INFINITY, f64::max)
}

/// Join canal pieces into one line running north to south.
fn join_north_to_south(mut pieces: Vec<LineString<f64>>) -> Option<LineString<f64>> {
    if pieces.is_empty() {
        return None;
    }
    pieces.sort_by(|a, b| top(b).total_cmp(&top(a)));

    let mut coords = Vec::new();
    for mut piece in pieces {
        if let (Some(first), Some(last)) = (piece.0.first(), piece.0.last()) {
            if first.y <= last.y {
                piece.0.reverse();
            }
        }
        for c in piece.0 {
            if coords.last() != Some(&c) {
                coords.push(c);
            }
        }
    }
    (coords.len() >= 2).then(|| LineString::new(coords))
}

/// Extend both ends of a line outward along its end bearings.
pub fn extrapolate(line: &LineString<f64>, distance_m: f64) -> LineString<f64> {
    let coords = &line.0;
    let n = coords.len();
    if n < 2 {
        return line.clone();
    }

    let head_bearing = bearing(coords[1].y, coords[1].x, coords[0].y, coords[0].x);
    let (head_lat, head_lon) = offset_by_bearing(coords[0].y, coords[0].x, distance_m, head_bearing);
    let tail_bearing = bearing(coords[n - 2].y, coords[n - 2].x, coords[n - 1].y, coords[n - 1].x);
    let (tail_lat, tail_lon) =
        offset_by_bearing(coords[n - 1].y, coords[n - 1].x, distance_m, tail_bearing);

    let mut out = Vec::with_capacity(n + 2);
    out.push(Coord {
        x: head_lon,
        y: head_lat,
    });
    out.extend_from_slice(coords);
    out.push(Coord {
        x: tail_lon,
        y: tail_lat,
    });
    LineString::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SphericalEngine;
    use crate::provider::{GeoJsonProvider, MemoryProvider};
    use crate::spatial::haversine_distance;
    use geo::{polygon, Contains};

    fn config() -> SailConfig {
        SailConfig {
            duration_days: 0.2,
            ..SailConfig::new(0.0, 0.0, 20.0)
        }
    }

    fn island(x: f64, y: f64) -> Record {
        Record::new(Shape::Polygon(polygon![
            (x: x, y: y),
            (x: x + 0.5, y: y),
            (x: x + 0.5, y: y + 0.5),
            (x: x, y: y + 0.5),
        ]))
    }

    #[test]
    fn joins_canal_pieces_north_to_south() {
        let south = LineString::from(vec![(32.3, 30.0), (32.4, 29.9)]);
        let north = LineString::from(vec![(32.3, 30.5), (32.3, 31.2)]);
        let joined = join_north_to_south(vec![south, north]).unwrap();
        assert_eq!(joined.0.first().unwrap().y, 31.2);
        assert_eq!(joined.0.last().unwrap().y, 29.9);
        assert_eq!(joined.0.len(), 4);
    }

    #[test]
    fn extrapolates_along_end_bearings() {
        let line = LineString::from(vec![(0.0, 1.0), (0.0, 0.0)]);
        let extended = extrapolate(&line, 60_000.0);
        assert_eq!(extended.0.len(), 4);
        let head = extended.0[0];
        let tail = extended.0[3];
        assert!(head.y > 1.0 && tail.y < 0.0);
        assert!((haversine_distance(1.0, 0.0, head.y, head.x) - 60_000.0).abs() < 1.0);
    }

    #[test]
    fn second_build_reuses_every_tile() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MemoryProvider::new()
            .with_records(Category::Land, vec![island(1.0, 1.0), island(3.0, 3.0)]);
        let engine = SphericalEngine::new();
        let config = config();
        let builder = ObstacleBuilder::new(&provider, &engine, &config).threads(Some(2));
        let tiles = dir.path().join("allLands");
        let request = LandRequest {
            buffer_m: 5_000.0,
            ..LandRequest::default()
        };

        let first = builder
            .build_lands(&dir.path().join("a.wkb.gz"), &tiles, &request)
            .unwrap();
        assert_eq!(first.tiles.created, 2);
        assert_eq!(first.lands.0.len(), 2);

        let second = builder
            .build_lands(&dir.path().join("b.wkb.gz"), &tiles, &request)
            .unwrap();
        assert_eq!(second.tiles.created, 0);
        assert_eq!(second.tiles.existing, 2);
        assert_eq!(
            io::encode_wkb_gz(&Shape::MultiPolygon(first.lands)).unwrap(),
            io::encode_wkb_gz(&Shape::MultiPolygon(second.lands)).unwrap()
        );
        assert!(dir.path().join("a.geojson").is_file());
    }

    #[test]
    fn skips_empty_records_and_rejects_lines() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SphericalEngine::new();
        let config = config();

        let provider = MemoryProvider::new().with_records(
            Category::Land,
            vec![Record::new(Shape::empty_polygonal()), island(1.0, 1.0)],
        );
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let built = builder
            .build_lands(
                &dir.path().join("lands.wkb.gz"),
                &dir.path().join("tiles"),
                &LandRequest::default(),
            )
            .unwrap();
        assert_eq!(built.tiles.skipped, 1);
        assert_eq!(built.tiles.created, 1);

        let provider = MemoryProvider::new().with_records(
            Category::Land,
            vec![Record::new(Shape::LineString(LineString::from(vec![
                (0.0, 0.0),
                (1.0, 1.0),
            ])))],
        );
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let err = builder
            .build_lands(
                &dir.path().join("lines.wkb.gz"),
                &dir.path().join("line-tiles"),
                &LandRequest::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GstError::UnexpectedGeometryKind { .. }));
    }

    #[test]
    fn local_extent_drops_distant_land() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SphericalEngine::new();
        let config = config();
        let provider = MemoryProvider::new()
            .with_records(Category::Land, vec![island(0.5, 0.5), island(40.0, 40.0)]);
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let extent = engine
            .buffer(
                &Shape::Point(Point::new(0.0, 0.0)),
                300_000.0,
                &BufferParams::new(64, 1.0e-10),
            )
            .unwrap()
            .to_multi_polygon()
            .unwrap();
        let built = builder
            .build_lands(
                &dir.path().join("lands.wkb.gz"),
                &dir.path().join("tiles"),
                &LandRequest {
                    extent: Some(extent),
                    ..LandRequest::default()
                },
            )
            .unwrap();
        assert_eq!(built.lands.0.len(), 1);
        assert!(built.lands.contains(&Point::new(0.75, 0.75)));
    }

    #[test]
    fn reports_when_no_land_exists() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SphericalEngine::new();
        let config = config();
        let provider = MemoryProvider::new().with_records(Category::Land, Vec::new());
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let built = builder
            .build_lands(
                &dir.path().join("lands.wkb.gz"),
                &dir.path().join("tiles"),
                &LandRequest::default(),
            )
            .unwrap();
        assert!(!built.found_land());

        let provider = MemoryProvider::new().with_records(Category::Land, vec![island(1.0, 1.0)]);
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let built = builder
            .build_lands(
                &dir.path().join("island.wkb.gz"),
                &dir.path().join("island-tiles"),
                &LandRequest::default(),
            )
            .unwrap();
        assert!(built.found_land());
    }

    #[test]
    fn no_canals_never_reads_the_river_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SphericalEngine::new();
        let config = SailConfig {
            canals: Vec::new(),
            ..config()
        };
        let provider = GeoJsonProvider::new(dir.path().join("missing"));
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let canals = builder.build_canals(&dir.path().join("allCanals.wkb.gz")).unwrap();
        assert!(canals.0.is_empty());
    }

    #[test]
    fn builds_named_canals_only() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SphericalEngine::new();
        let config = config();
        let provider = MemoryProvider::new().with_records(
            Category::RiversLakeCenterlines,
            vec![
                Record::new(Shape::LineString(LineString::from(vec![(32.3, 29.9), (32.3, 31.2)])))
                    .with_attribute("NAME", "Suez Canal"),
                Record::new(Shape::LineString(LineString::from(vec![(31.0, 30.0), (31.0, 25.0)])))
                    .with_attribute("NAME", "Nile"),
            ],
        );
        let builder = ObstacleBuilder::new(&provider, &engine, &config);
        let canals = builder.build_canals(&dir.path().join("allCanals.wkb.gz")).unwrap();
        assert_eq!(canals.0.len(), 1);
        assert_eq!(canals.0[0].0.first().unwrap().y, 31.2);

        let again = builder.build_canals(&dir.path().join("allCanals.wkb.gz")).unwrap();
        assert_eq!(again, canals);
    }
}
