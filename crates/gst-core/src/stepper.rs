//! Wavefront expansion of the reachable region, one precision step at a time.
//!
//! Every step buffers the frontier ("limit") of the region outward, unions
//! it in, subtracts the obstacles relevant to the current epoch and fills
//! pockets of unreachable sea. Each finished step is checkpointed, so a run
//! restarted with the same configuration skips straight past it.

use std::time::{Duration, Instant};

use geo::{Contains, MultiLineString, Point, Polygon, Rect};

use crate::config::SailConfig;
use crate::engine::{remove_domain_edges, BufferParams, GeometryEngine};
use crate::errors::{GstError, Result};
use crate::models::Shape;
use crate::relevance::{filter_relevant, RelevantObstacles};
use crate::rings::remove_interior_rings_except_obstacles;
use crate::spatial::half_circumference_m;
use crate::store::{CheckpointStore, Slot};

/// Directions sampled when buffering a region by the epoch reach.
const REACH_ANGULAR_RESOLUTION: usize = 361;

/// Vertex spacing when buffering a region by the epoch reach, in degrees.
const REACH_FILL_DEG: f64 = 1.0;

/// Frontier segments this close to ±180 or ±90 lie on the domain edge.
const EDGE_EPSILON_DEG: f64 = 1.0e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    ReevaluateObstacles,
    Advance,
    Simplify,
    Checkpoint,
    Done,
}

/// What happened during one step.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: usize,
    /// Loaded from a checkpoint instead of computed.
    pub resumed: bool,
    pub points: usize,
    pub polygons: usize,
    pub relevant_obstacles: usize,
    pub bounds: Option<Rect<f64>>,
    /// Planar area in square degrees.
    pub area: f64,
    pub distance_m: f64,
    pub sailed: chrono::Duration,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub nstep: usize,
    pub computed: usize,
    pub resumed: usize,
    pub region: Shape,
}

pub struct Stepper<'a> {
    config: &'a SailConfig,
    engine: &'a dyn GeometryEngine,
    store: &'a dyn CheckpointStore,
    obstacles: &'a [Polygon<f64>],
    start: Point<f64>,
    nstep: usize,
    next_step: usize,
    region: Shape,
    relevant: Option<(usize, RelevantObstacles)>,
    phase: Phase,
}

impl<'a> Stepper<'a> {
    /// Validate the run and position the stepper before its first step.
    pub fn new(
        config: &'a SailConfig,
        engine: &'a dyn GeometryEngine,
        store: &'a dyn CheckpointStore,
        obstacles: &'a [Polygon<f64>],
    ) -> Result<Self> {
        config.validate()?;
        config.check_precision()?;

        let start = Point::new(config.lon, config.lat);
        if obstacles.iter().any(|land| land.contains(&start)) {
            return Err(GstError::StartOnLand {
                lon: config.lon,
                lat: config.lat,
            });
        }

        Ok(Self {
            config,
            engine,
            store,
            obstacles,
            start,
            nstep: config.nstep(),
            next_step: 0,
            region: Shape::Point(start),
            relevant: None,
            phase: Phase::Init,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn region(&self) -> &Shape {
        &self.region
    }

    pub fn nstep(&self) -> usize {
        self.nstep
    }

    pub fn next_step(&self) -> usize {
        self.next_step
    }

    /// Run every remaining step.
    pub fn run(&mut self) -> Result<RunSummary> {
        let mut computed = 0;
        let mut resumed = 0;
        while let Some(report) = self.advance()? {
            if report.resumed {
                resumed += 1;
            } else {
                computed += 1;
            }
        }
        tracing::info!(computed, resumed, "sailing finished");
        Ok(RunSummary {
            nstep: self.nstep,
            computed,
            resumed,
            region: self.region.clone(),
        })
    }

    /// Perform the next step; `None` once every step is done.
    pub fn advance(&mut self) -> Result<Option<StepReport>> {
        let step = self.next_step;
        if step >= self.nstep {
            self.phase = Phase::Done;
            return Ok(None);
        }
        let started = Instant::now();

        let distance_m = (step + 1) as f64 * self.config.precision_m;
        let sailed = self.config.step_duration() * (step + 1) as i32;
        tracing::info!(
            "Iteration {}/{} ({:.2} kilometres/{:.4} days of sailing)",
            step + 1,
            self.nstep,
            distance_m / 1000.0,
            sailed.num_seconds() as f64 / 86_400.0
        );

        if self.config.is_land_step(step) {
            self.relevant = None;
        }

        if self.store.exists(Slot::Region, step)? {
            self.region = self.store.load(Slot::Region, step)?;
            self.next_step += 1;
            return Ok(Some(self.report(step, true, distance_m, sailed, started)));
        }

        self.ensure_relevant(step)?;
        let epoch = self.config.epoch_start(step);
        let relevant = match &self.relevant {
            Some((_, relevant)) => relevant,
            None => {
                return Err(GstError::MissingCheckpoint {
                    slot: Slot::RelevantObstacles,
                    step: epoch,
                })
            }
        };

        self.phase = Phase::Advance;
        let limit = match &self.region {
            Shape::Point(p) => Shape::Point(*p),
            region => {
                let boundary = Shape::MultiLineString(MultiLineString::new(region.lines()));
                let open = if relevant.is_empty() {
                    boundary
                } else {
                    self.engine.difference(&boundary, &relevant.merged)?
                };
                Shape::MultiLineString(remove_domain_edges(
                    &open.to_multi_line_string()?,
                    EDGE_EPSILON_DEG,
                ))
            }
        };
        self.store.save(Slot::Limit, step, &limit)?;

        let simplify_step = self.config.is_simplify_step(step);
        let mut params = BufferParams::new(self.config.angular_resolution, self.config.tolerance_deg)
            .fill(self.config.fill_deg());
        if simplify_step {
            params = params
                .keep_interiors(true)
                .simplify(self.config.simplify_deg());
        }
        let grown = if limit.is_empty() {
            Shape::empty_polygonal()
        } else {
            self.engine.buffer(&limit, self.config.precision_m, &params)?
        };

        let mut region = self.engine.union(&[grown, self.region.clone()])?;
        if !relevant.is_empty() {
            region = self.engine.difference(&region, &relevant.merged)?;
        }
        if simplify_step {
            self.phase = Phase::Simplify;
            region = self.engine.simplify(&region, self.config.simplify_deg());
        }
        let region = Shape::MultiPolygon(remove_interior_rings_except_obstacles(
            &region.to_multi_polygon()?,
            &relevant.centroids,
            self.config.hole_match_distance_m(),
        ));

        self.phase = Phase::Checkpoint;
        self.store.save(Slot::Region, step, &region)?;
        self.region = region;
        self.next_step += 1;
        Ok(Some(self.report(step, false, distance_m, sailed, started)))
    }

    /// Make sure the relevant obstacles of the epoch containing `step` are loaded.
    fn ensure_relevant(&mut self, step: usize) -> Result<()> {
        let epoch = self.config.epoch_start(step);
        if matches!(&self.relevant, Some((loaded, _)) if *loaded == epoch) {
            return Ok(());
        }
        self.phase = Phase::ReevaluateObstacles;

        let relevant = if self.store.exists(Slot::RelevantObstacles, epoch)? {
            RelevantObstacles::from_shape(&self.store.load(Slot::RelevantObstacles, epoch)?)
        } else {
            let basis = if epoch == 0 {
                Shape::Point(self.start)
            } else if self.store.exists(Slot::Region, epoch - 1)? {
                self.store.load(Slot::Region, epoch - 1)?
            } else {
                self.region.clone()
            };
            let relevant = self.compute_relevant(&basis)?;
            self.store
                .save(Slot::RelevantObstacles, epoch, &relevant.to_shape())?;
            relevant
        };

        tracing::info!(
            epoch,
            relevant = relevant.len(),
            total = self.obstacles.len(),
            "re-evaluated relevant obstacles"
        );
        self.relevant = Some((epoch, relevant));
        Ok(())
    }

    fn compute_relevant(&self, basis: &Shape) -> Result<RelevantObstacles> {
        let reach_m = self.config.reach_distance_m();
        let reach = if reach_m > half_circumference_m() {
            None
        } else {
            let simplified = self.engine.simplify(basis, self.config.simplify_deg());
            let params = BufferParams::new(REACH_ANGULAR_RESOLUTION, self.config.tolerance_deg)
                .fill(REACH_FILL_DEG);
            Some(
                self.engine
                    .buffer(&simplified, reach_m, &params)?
                    .to_multi_polygon()?,
            )
        };
        Ok(RelevantObstacles::new(filter_relevant(
            basis,
            reach.as_ref(),
            self.obstacles,
        )))
    }

    fn report(
        &self,
        step: usize,
        resumed: bool,
        distance_m: f64,
        sailed: chrono::Duration,
        started: Instant,
    ) -> StepReport {
        let report = StepReport {
            step,
            resumed,
            points: self.region.point_count(),
            polygons: self.region.polygon_count(),
            relevant_obstacles: self.relevant.as_ref().map_or(0, |(_, r)| r.len()),
            bounds: self.region.bounds(),
            area: self.region.area(),
            distance_m,
            sailed,
            elapsed: started.elapsed(),
        };
        tracing::debug!(
            step,
            resumed,
            points = report.points,
            polygons = report.polygons,
            area = report.area,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "step complete"
        );
        report
    }
}
