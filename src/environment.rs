//! The resource grid: topology, range tables and per-tick dynamics.

use crate::cell::{Cell, CellId, Direction, Season};
use crate::config::{Config, NeighborhoodMode, PollutionConfig, RangeMode};
use crate::error::{Result, SimError};
use crate::landscape;
use std::collections::{BTreeMap, BTreeSet};

/// Largest vision or movement any agent can ever have under `config`.
/// Penalties stack, so the most favourable one counts once per disease an
/// agent may carry.
pub fn max_agent_range(config: &Config) -> u32 {
    let agents = &config.agents;
    let diseases = &config.diseases;
    let base = agents.vision.max().max(agents.movement_range().max());
    if diseases.count == 0 {
        return base;
    }
    let per_disease = diseases
        .vision_penalty
        .max()
        .max(diseases.movement_penalty.max())
        .max(0) as u32;
    let carried = diseases.per_agent.max().min(diseases.count as u32);
    base + per_disease * carried
}

/// Owns every cell and advances regrowth, seasons and pollution
#[derive(Clone, Debug)]
pub struct Environment {
    pub width: usize,
    pub height: usize,
    pub wraparound: bool,
    pub neighborhood: NeighborhoodMode,
    pub equator: usize,
    pub range_mode: RangeMode,
    /// Bound used when the range tables were built
    pub max_range: u32,
    pub timestep: u64,

    cells: Vec<Cell>,

    sugar_regrow_rate: f64,
    spice_regrow_rate: f64,
    season_interval: u64,
    seasonal_growback_delay: u64,
    growback_countdown: u64,
    dry_growback_due: bool,

    pollution: PollutionConfig,
    diffusion_countdown: u64,
    /// Inside the diffusion timeframe this tick
    diffusion_active: bool,
    diffusion_due: bool,
    /// `pollution_flux` was computed on the previous tick
    flux_ready: bool,
}

impl Environment {
    /// Build the grid, neighbour lists and range tables
    pub fn new(config: &Config) -> Self {
        let env = &config.environment;
        let mut cells = Vec::with_capacity(env.width * env.height);
        for y in 0..env.height {
            for x in 0..env.width {
                let mut cell = Cell::new(y * env.width + x, x, y);
                let (max_sugar, max_spice) = landscape::capacity_at(env, x, y);
                cell.set_capacity(max_sugar, max_spice);
                cells.push(cell);
            }
        }

        let equator = env.equator_row();
        if env.season_interval > 0 {
            for cell in &mut cells {
                cell.season = if cell.y < equator { Season::Wet } else { Season::Dry };
            }
        }

        let mut environment = Self {
            width: env.width,
            height: env.height,
            wraparound: env.wraparound,
            neighborhood: env.neighborhood,
            equator,
            range_mode: config.agents.range_mode,
            max_range: max_agent_range(config),
            timestep: 0,
            cells,
            sugar_regrow_rate: env.sugar_regrow_rate,
            spice_regrow_rate: env.spice_regrow_rate,
            season_interval: env.season_interval,
            seasonal_growback_delay: env.seasonal_growback_delay,
            growback_countdown: env.seasonal_growback_delay,
            dry_growback_due: false,
            pollution: env.pollution.clone(),
            diffusion_countdown: env.pollution.diffusion_delay,
            diffusion_active: false,
            diffusion_due: false,
            flux_ready: false,
        };
        environment.find_neighbors(env.neighborhood);
        environment.find_cell_ranges();
        environment
    }

    // ------------------------------------------------------------------
    // Coordinates
    // ------------------------------------------------------------------

    /// Row-major index of `(x, y)`
    pub fn id_of(&self, x: i64, y: i64) -> Result<CellId> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return Err(SimError::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(y as usize * self.width + x as usize)
    }

    /// Cell `(dx, dy)` away from `(x, y)`, wrapping when enabled
    pub fn offset_cell(&self, x: usize, y: usize, dx: i64, dy: i64) -> Option<CellId> {
        let nx = Self::wrap_axis(x as i64 + dx, self.width, self.wraparound)?;
        let ny = Self::wrap_axis(y as i64 + dy, self.height, self.wraparound)?;
        Some(ny * self.width + nx)
    }

    fn wrap_axis(value: i64, len: usize, wraparound: bool) -> Option<usize> {
        let len = len as i64;
        if wraparound {
            Some(value.rem_euclid(len) as usize)
        } else if (0..len).contains(&value) {
            Some(value as usize)
        } else {
            None
        }
    }

    /// Distance along one axis: `min(|d|, L - |d|)` when wrapping, else `|d|`
    #[inline]
    pub fn axis_distance(&self, a: usize, b: usize, len: usize) -> usize {
        let d = a.abs_diff(b);
        if self.wraparound {
            d.min(len - d)
        } else {
            d
        }
    }

    /// Wraparound-aware `(dx, dy)` magnitudes between two cells
    pub fn deltas(&self, a: CellId, b: CellId) -> (usize, usize) {
        let (ca, cb) = (&self.cells[a], &self.cells[b]);
        (
            self.axis_distance(ca.x, cb.x, self.width),
            self.axis_distance(ca.y, cb.y, self.height),
        )
    }

    /// Sum of axis-aligned offsets
    pub fn travel_distance(&self, a: CellId, b: CellId) -> u32 {
        let (dx, dy) = self.deltas(a, b);
        (dx + dy) as u32
    }

    /// Distance bucket between two cells under the configured range mode,
    /// or `None` when `b` is unreachable from `a` within `max_range`
    pub fn range_distance(&self, a: CellId, b: CellId) -> Option<u32> {
        if a == b {
            return Some(0);
        }
        let (dx, dy) = self.deltas(a, b);
        let bucket = match self.range_mode {
            RangeMode::Cardinal => {
                if dx != 0 && dy != 0 {
                    return None;
                }
                (dx + dy) as u32
            }
            RangeMode::Radial => {
                let d = ((dx * dx + dy * dy) as f64).sqrt();
                if d > self.max_range as f64 {
                    return None;
                }
                d.ceil() as u32
            }
        };
        (bucket <= self.max_range).then_some(bucket)
    }

    // ------------------------------------------------------------------
    // Topology
    // ------------------------------------------------------------------

    /// Resolve cardinal neighbours, then diagonals from the cardinal ones
    pub fn find_neighbors(&mut self, mode: NeighborhoodMode) {
        let cardinal: Vec<Vec<(Direction, CellId)>> = self
            .cells
            .iter()
            .map(|cell| {
                let mut found: Vec<(Direction, CellId)> = Vec::with_capacity(8);
                for direction in Direction::CARDINAL {
                    let (dx, dy) = direction.offset();
                    if let Some(id) = self.offset_cell(cell.x, cell.y, dx, dy) {
                        if id != cell.id && !found.iter().any(|&(_, seen)| seen == id) {
                            found.push((direction, id));
                        }
                    }
                }
                found
            })
            .collect();

        for (cell, neighbors) in self.cells.iter_mut().zip(cardinal.iter()) {
            cell.neighbors = neighbors.clone();
        }

        if mode == NeighborhoodMode::Moore {
            let lookup = |id: CellId, dir: Direction| -> Option<CellId> {
                cardinal[id].iter().find(|(d, _)| *d == dir).map(|&(_, n)| n)
            };
            for id in 0..self.cells.len() {
                let diagonals = [
                    (Direction::NorthEast, Direction::North, Direction::East),
                    (Direction::SouthEast, Direction::South, Direction::East),
                    (Direction::SouthWest, Direction::South, Direction::West),
                    (Direction::NorthWest, Direction::North, Direction::West),
                ];
                for (diagonal, vertical, horizontal) in diagonals {
                    let Some(via) = lookup(id, vertical) else { continue };
                    let Some(target) = lookup(via, horizontal) else { continue };
                    let cell = &mut self.cells[id];
                    if target != id && !cell.neighbors.iter().any(|&(_, seen)| seen == target) {
                        cell.neighbors.push((diagonal, target));
                    }
                }
            }
        }
    }

    /// Build the symmetric distance tables once.
    ///
    /// Radial mode stores every pair within `max_range` Euclidean distance,
    /// bucketed by rounded-up distance. Cardinal mode stores only same-row
    /// and same-column pairs. Each unordered pair is visited once and
    /// mirrored onto both cells.
    pub fn find_cell_ranges(&mut self) {
        let n = self.cells.len();
        let reach = self.max_range as i64;
        // Offsets beyond the axis length only alias cells already covered
        let max_dx = reach.min(self.width as i64);
        let max_dy = reach.min(self.height as i64);
        let mut tables: Vec<BTreeMap<u32, Vec<CellId>>> = vec![BTreeMap::new(); n];

        for a in 0..n {
            let (ax, ay) = (self.cells[a].x, self.cells[a].y);
            let mut partners = BTreeSet::new();
            match self.range_mode {
                RangeMode::Radial => {
                    for dy in -max_dy..=max_dy {
                        for dx in -max_dx..=max_dx {
                            if let Some(b) = self.offset_cell(ax, ay, dx, dy) {
                                if b > a {
                                    partners.insert(b);
                                }
                            }
                        }
                    }
                }
                RangeMode::Cardinal => {
                    let row = (1..=max_dx).flat_map(|d| [(d, 0), (-d, 0)]);
                    let column = (1..=max_dy).flat_map(|d| [(0, d), (0, -d)]);
                    for (dx, dy) in row.chain(column) {
                        if let Some(b) = self.offset_cell(ax, ay, dx, dy) {
                            if b > a {
                                partners.insert(b);
                            }
                        }
                    }
                }
            }
            for b in partners {
                if let Some(bucket) = self.range_distance(a, b) {
                    if bucket == 0 {
                        continue;
                    }
                    tables[a].entry(bucket).or_default().push(b);
                    tables[b].entry(bucket).or_default().push(a);
                }
            }
        }

        for (cell, table) in self.cells.iter_mut().zip(tables) {
            cell.ranges = table;
        }
    }

    /// Cells an agent on `origin` can evaluate within `range`, with their
    /// distance, excluding `origin` itself.
    ///
    /// Cardinal mode walks each direction outward; radial mode reads the
    /// range table. Duplicates from wrapping keep the shorter distance.
    pub fn cells_in_range(&self, origin: CellId, range: u32) -> Vec<(CellId, u32)> {
        let range = range.min(self.max_range);
        let mut found: BTreeMap<CellId, u32> = BTreeMap::new();
        match self.range_mode {
            RangeMode::Cardinal => {
                let (x, y) = (self.cells[origin].x, self.cells[origin].y);
                for direction in Direction::CARDINAL {
                    let (dx, dy) = direction.offset();
                    for step in 1..=range as i64 {
                        let Some(id) = self.offset_cell(x, y, dx * step, dy * step) else {
                            break;
                        };
                        if id == origin {
                            continue;
                        }
                        let distance = self.travel_distance(origin, id);
                        found
                            .entry(id)
                            .and_modify(|d| *d = (*d).min(distance))
                            .or_insert(distance);
                    }
                }
            }
            RangeMode::Radial => {
                for (distance, id) in self.cells[origin].cells_within(range) {
                    found.entry(id).or_insert(distance);
                }
            }
        }
        found.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Per-tick dynamics
    // ------------------------------------------------------------------

    /// Advance the environment by one tick
    pub fn do_timestep(&mut self, timestep: u64) {
        self.timestep = timestep;
        self.update_seasons();
        self.update_pollution();
        self.do_cell_update();
    }

    /// Flip hemispheres on season boundaries and count down dry growback
    pub fn update_seasons(&mut self) {
        if self.season_interval == 0 {
            self.dry_growback_due = true;
            return;
        }
        if self.timestep > 0 && self.timestep % self.season_interval == 0 {
            for cell in &mut self.cells {
                cell.season = cell.season.flip();
            }
            self.growback_countdown = self.seasonal_growback_delay;
            log::debug!("Seasons flipped at tick {}", self.timestep);
        }
        self.growback_countdown = self.growback_countdown.saturating_sub(1);
        self.dry_growback_due = self.growback_countdown == 0;
        if self.dry_growback_due {
            self.growback_countdown = self.seasonal_growback_delay;
        }
    }

    /// Count down to the next diffusion pass
    pub fn update_pollution(&mut self) {
        self.diffusion_due = false;
        let delay = self.pollution.diffusion_delay;
        let frame = self.pollution.diffusion_timeframe;
        self.diffusion_active = delay > 0 && (frame.min()..=frame.max()).contains(&self.timestep);
        if delay == 0 {
            return;
        }
        self.diffusion_countdown = self.diffusion_countdown.saturating_sub(1);
        if self.diffusion_countdown == 0 {
            self.diffusion_countdown = delay;
            self.diffusion_due = self.diffusion_active;
        }
    }

    /// Regrow every cell, apply last tick's pollution flux on a diffusion
    /// boundary, then compute the flux for the next one
    pub fn do_cell_update(&mut self) {
        for cell in &mut self.cells {
            if cell.season == Season::Dry && !self.dry_growback_due {
                cell.sugar_produced = 0.0;
                cell.spice_produced = 0.0;
                continue;
            }
            cell.regrow_sugar(self.sugar_regrow_rate);
            cell.regrow_spice(self.spice_regrow_rate);
        }

        if self.diffusion_due && self.flux_ready {
            for cell in &mut self.cells {
                cell.pollution = cell.pollution_flux;
            }
        }
        self.flux_ready = false;
        if self.diffusion_active {
            let fluxes: Vec<f64> = self
                .cells
                .iter()
                .map(|cell| {
                    let count = cell.neighbors.len();
                    if count == 0 {
                        cell.pollution
                    } else {
                        cell.neighbors().map(|n| self.cells[n].pollution).sum::<f64>() / count as f64
                    }
                })
                .collect();
            for (cell, flux) in self.cells.iter_mut().zip(fluxes) {
                cell.pollution_flux = flux;
            }
            self.flux_ready = true;
        }
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    #[inline]
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id]
    }

    #[inline]
    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id]
    }

    /// Cell at coordinates
    pub fn cell_at(&self, x: usize, y: usize) -> Result<&Cell> {
        let id = self.id_of(x as i64, y as i64)?;
        Ok(&self.cells[id])
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn sugar_regrow_rate(&self) -> f64 {
        self.sugar_regrow_rate
    }

    pub fn spice_regrow_rate(&self) -> f64 {
        self.spice_regrow_rate
    }

    /// Total sugar on the grid
    pub fn total_sugar(&self) -> f64 {
        self.cells.iter().map(Cell::sugar).sum()
    }

    /// Total spice on the grid
    pub fn total_spice(&self) -> f64 {
        self.cells.iter().map(Cell::spice).sum()
    }

    /// Total pollution on the grid
    pub fn total_pollution(&self) -> f64 {
        self.cells.iter().map(|c| c.pollution).sum()
    }

    /// Verify `0 <= stock <= capacity` everywhere
    pub fn check_stock_invariants(&self) -> Result<()> {
        self.cells.iter().try_for_each(Cell::check_stock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Landscape, Span};

    fn grid_config(width: usize, height: usize, wraparound: bool) -> Config {
        let mut config = Config::default();
        config.environment.width = width;
        config.environment.height = height;
        config.environment.wraparound = wraparound;
        config.environment.landscape = Landscape::Uniform;
        config.agents.starting_agents = 1;
        config.agents.vision = Span(1, 3);
        config
    }

    #[test]
    fn test_wraparound_distance() {
        let env = Environment::new(&grid_config(10, 10, true));
        let a = env.id_of(0, 0).unwrap();
        let b = env.id_of(9, 0).unwrap();
        assert_eq!(env.travel_distance(a, b), 1);
        assert_eq!(env.range_distance(a, b), Some(1));

        let flat = Environment::new(&grid_config(10, 10, false));
        assert_eq!(flat.travel_distance(a, b), 9);
        assert_eq!(flat.range_distance(a, b), None);
    }

    #[test]
    fn test_von_neumann_edges() {
        let env = Environment::new(&grid_config(5, 5, false));
        let corner = env.cell(env.id_of(0, 0).unwrap());
        assert_eq!(corner.neighbors().count(), 2);
        assert_eq!(corner.neighbor(Direction::North), None);
        assert_eq!(corner.neighbor(Direction::East), Some(1));

        let wrapped = Environment::new(&grid_config(5, 5, true));
        let corner = wrapped.cell(0);
        assert_eq!(corner.neighbors().count(), 4);
        assert_eq!(corner.neighbor(Direction::West), Some(4));
        assert_eq!(corner.neighbor(Direction::North), Some(20));
    }

    #[test]
    fn test_moore_diagonals() {
        let mut config = grid_config(5, 5, false);
        config.environment.neighborhood = NeighborhoodMode::Moore;
        let env = Environment::new(&config);
        let center = env.cell(env.id_of(2, 2).unwrap());
        assert_eq!(center.neighbors().count(), 8);
        assert_eq!(center.neighbor(Direction::NorthEast), Some(env.id_of(3, 1).unwrap()));
        assert_eq!(center.neighbor(Direction::SouthWest), Some(env.id_of(1, 3).unwrap()));
        let corner = env.cell(0);
        assert_eq!(corner.neighbors().count(), 3);
    }

    #[test]
    fn test_range_table_symmetry() {
        for mode in [RangeMode::Cardinal, RangeMode::Radial] {
            for wrap in [false, true] {
                let mut config = grid_config(8, 7, wrap);
                config.agents.range_mode = mode;
                let env = Environment::new(&config);
                for a in env.cells() {
                    for (distance, b) in a.cells_within(env.max_range) {
                        let back = env.cell(b).range(distance);
                        assert!(
                            back.contains(&a.id),
                            "{:?} wrap={} missing mirror {}->{} at {}",
                            mode,
                            wrap,
                            a.id,
                            b,
                            distance
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_cardinal_table_same_axis_only() {
        let env = Environment::new(&grid_config(6, 6, false));
        let origin = env.cell(env.id_of(2, 2).unwrap());
        for (_, id) in origin.cells_within(3) {
            let other = env.cell(id);
            assert!(other.x == origin.x || other.y == origin.y);
        }
        assert_eq!(origin.range(1).len(), 4);
    }

    #[test]
    fn test_radial_table_excludes_far_cells() {
        let mut config = grid_config(9, 9, false);
        config.agents.range_mode = RangeMode::Radial;
        config.agents.vision = Span(2, 2);
        let env = Environment::new(&config);
        let center = env.cell(env.id_of(4, 4).unwrap());
        let diagonal = env.id_of(5, 5).unwrap();
        // sqrt(2) lands in bucket 2
        assert!(center.range(2).contains(&diagonal));
        // (6, 6) is sqrt(8) away, beyond range 2
        let far = env.id_of(6, 6).unwrap();
        assert!(center.cells_within(2).all(|(_, id)| id != far));
    }

    #[test]
    fn test_cardinal_walk_dedups_on_wrap() {
        let mut config = grid_config(4, 4, true);
        config.agents.vision = Span(3, 3);
        let env = Environment::new(&config);
        let cells = env.cells_in_range(0, 3);
        // Row and column minus the origin
        assert_eq!(cells.len(), 6);
        let east = env.id_of(1, 0).unwrap();
        let west = env.id_of(3, 0).unwrap();
        assert!(cells.contains(&(east, 1)));
        assert!(cells.contains(&(west, 1)));
    }

    #[test]
    fn test_regrowth_deterministic() {
        let mut config = grid_config(4, 4, false);
        config.environment.max_sugar = 4.0;
        config.environment.sugar_regrow_rate = 1.0;
        let mut env = Environment::new(&config);
        env.cell_mut(5).set_stock(2.5, 0.0);
        env.cell_mut(6).set_stock(0.0, 0.0);
        env.do_timestep(1);
        assert_eq!(env.cell(5).sugar(), 3.5);
        assert_eq!(env.cell(6).sugar(), 1.0);
        assert_eq!(env.cell(7).sugar(), 4.0);
        assert_eq!(env.cell(7).sugar_produced, 0.0);
        assert!(env.check_stock_invariants().is_ok());
    }

    #[test]
    fn test_dry_hemisphere_waits_for_growback() {
        let mut config = grid_config(4, 4, false);
        config.environment.season_interval = 100;
        config.environment.seasonal_growback_delay = 3;
        let mut env = Environment::new(&config);
        for cell in 0..16 {
            env.cell_mut(cell).set_stock(0.0, 0.0);
        }
        let north = env.id_of(0, 0).unwrap();
        let south = env.id_of(0, 3).unwrap();
        assert_eq!(env.cell(north).season, Season::Wet);
        assert_eq!(env.cell(south).season, Season::Dry);

        env.do_timestep(1);
        env.do_timestep(2);
        assert_eq!(env.cell(north).sugar(), 2.0);
        assert_eq!(env.cell(south).sugar(), 0.0);
        env.do_timestep(3);
        assert_eq!(env.cell(south).sugar(), 1.0);
    }

    #[test]
    fn test_seasons_flip_on_interval() {
        let mut config = grid_config(4, 4, false);
        config.environment.season_interval = 5;
        let mut env = Environment::new(&config);
        for t in 1..5 {
            env.do_timestep(t);
        }
        assert_eq!(env.cell(0).season, Season::Wet);
        env.do_timestep(5);
        assert_eq!(env.cell(0).season, Season::Dry);
        assert_eq!(env.cell(15).season, Season::Wet);
    }

    #[test]
    fn test_pollution_diffusion_on_delay_boundary() {
        let mut config = grid_config(3, 1, false);
        config.environment.pollution.diffusion_delay = 2;
        let mut env = Environment::new(&config);
        env.cell_mut(1).pollution = 6.0;

        env.do_timestep(1);
        assert_eq!(env.cell(1).pollution, 6.0);
        // Ends each see only the middle; the middle sees two clean cells
        assert_eq!(env.cell(0).pollution_flux, 6.0);
        assert_eq!(env.cell(1).pollution_flux, 0.0);

        // Pollution added after the flux was computed is overwritten
        env.cell_mut(0).pollution = 10.0;
        env.do_timestep(2);
        assert_eq!(env.cell(0).pollution, 6.0);
        assert_eq!(env.cell(1).pollution, 0.0);
        assert_eq!(env.cell(2).pollution, 6.0);

        // Off the boundary the flux is tracked but not applied
        env.do_timestep(3);
        assert_eq!(env.cell(1).pollution, 0.0);
        assert_eq!(env.cell(1).pollution_flux, 6.0);
    }

    #[test]
    fn test_no_diffusion_outside_timeframe() {
        let mut config = grid_config(3, 1, false);
        config.environment.pollution.diffusion_delay = 1;
        config.environment.pollution.diffusion_timeframe = Span(5, 10);
        let mut env = Environment::new(&config);
        env.cell_mut(1).pollution = 6.0;
        for t in 1..=5 {
            env.do_timestep(t);
        }
        // Flux first computed on tick 5, so nothing has moved yet
        assert_eq!(env.cell(1).pollution, 6.0);
        env.do_timestep(6);
        assert_eq!(env.cell(1).pollution, 0.0);
        assert_eq!(env.cell(0).pollution, 6.0);
    }

    #[test]
    fn test_range_bound_covers_stacked_disease_penalties() {
        let mut config = grid_config(30, 1, false);
        config.agents.vision = Span(1, 1);
        config.diseases.count = 3;
        config.diseases.per_agent = Span(3, 3);
        config.diseases.vision_penalty = Span(2, 2);
        config.diseases.movement_penalty = Span(0, 0);
        assert_eq!(max_agent_range(&config), 7);

        let env = Environment::new(&config);
        let farthest = env.cells_in_range(0, 7).iter().map(|&(_, d)| d).max();
        assert_eq!(farthest, Some(7));
    }

    #[test]
    fn test_out_of_bounds() {
        let env = Environment::new(&grid_config(4, 4, false));
        assert!(matches!(env.id_of(4, 0), Err(SimError::OutOfBounds { .. })));
        assert!(env.cell_at(3, 3).is_ok());
    }
}
