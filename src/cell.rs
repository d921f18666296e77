//! Grid cells: resource stock, pollution, season and occupancy.

use crate::agent::AgentId;
use crate::config::PollutionConfig;
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Index of a cell in the row-major grid
pub type CellId = usize;

/// Compass directions used for neighbour lookup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
}

impl Direction {
    /// The four von Neumann directions
    pub const CARDINAL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Unit offset `(dx, dy)`; rows grow southwards
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
        }
    }
}

/// Hemisphere season gating regrowth
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Season {
    Wet,
    Dry,
    /// Seasons disabled
    None,
}

impl Season {
    /// Opposite season; `None` stays `None`
    pub fn flip(self) -> Season {
        match self {
            Season::Wet => Season::Dry,
            Season::Dry => Season::Wet,
            Season::None => Season::None,
        }
    }
}

/// A single grid cell
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: CellId,
    pub x: usize,
    pub y: usize,
    max_sugar: f64,
    max_spice: f64,
    sugar: f64,
    spice: f64,
    pub pollution: f64,
    pub pollution_flux: f64,
    pub season: Season,
    /// Sugar grown during the last regrowth pass
    pub sugar_produced: f64,
    /// Spice grown during the last regrowth pass
    pub spice_produced: f64,
    occupant: Option<AgentId>,
    pub(crate) neighbors: Vec<(Direction, CellId)>,
    /// Distance bucket -> cells at that (rounded-up) distance
    pub(crate) ranges: BTreeMap<u32, Vec<CellId>>,
}

impl Cell {
    /// Create an empty cell with zero capacity
    pub fn new(id: CellId, x: usize, y: usize) -> Self {
        Self {
            id,
            x,
            y,
            max_sugar: 0.0,
            max_spice: 0.0,
            sugar: 0.0,
            spice: 0.0,
            pollution: 0.0,
            pollution_flux: 0.0,
            season: Season::None,
            sugar_produced: 0.0,
            spice_produced: 0.0,
            occupant: None,
            neighbors: Vec::new(),
            ranges: BTreeMap::new(),
        }
    }

    /// Set capacities and fill the cell
    pub fn set_capacity(&mut self, max_sugar: f64, max_spice: f64) {
        self.max_sugar = max_sugar.max(0.0);
        self.max_spice = max_spice.max(0.0);
        self.sugar = self.max_sugar;
        self.spice = self.max_spice;
    }

    #[inline]
    pub fn sugar(&self) -> f64 {
        self.sugar
    }

    #[inline]
    pub fn spice(&self) -> f64 {
        self.spice
    }

    #[inline]
    pub fn max_sugar(&self) -> f64 {
        self.max_sugar
    }

    #[inline]
    pub fn max_spice(&self) -> f64 {
        self.max_spice
    }

    /// Combined stock of both resources
    #[inline]
    pub fn wealth(&self) -> f64 {
        self.sugar + self.spice
    }

    /// Combined capacity of both resources
    #[inline]
    pub fn max_wealth(&self) -> f64 {
        self.max_sugar + self.max_spice
    }

    /// Set stock directly, clamped to `[0, capacity]`
    pub fn set_stock(&mut self, sugar: f64, spice: f64) {
        self.sugar = sugar.clamp(0.0, self.max_sugar);
        self.spice = spice.clamp(0.0, self.max_spice);
    }

    /// Grow sugar toward capacity, returning the amount produced
    pub fn regrow_sugar(&mut self, rate: f64) -> f64 {
        let grown = (self.sugar + rate).min(self.max_sugar);
        self.sugar_produced = (grown - self.sugar).max(0.0);
        self.sugar = grown.max(self.sugar);
        self.sugar_produced
    }

    /// Grow spice toward capacity, returning the amount produced
    pub fn regrow_spice(&mut self, rate: f64) -> f64 {
        let grown = (self.spice + rate).min(self.max_spice);
        self.spice_produced = (grown - self.spice).max(0.0);
        self.spice = grown.max(self.spice);
        self.spice_produced
    }

    /// Empty the cell, returning what was there
    pub fn harvest(&mut self) -> (f64, f64) {
        let taken = (self.sugar, self.spice);
        self.sugar = 0.0;
        self.spice = 0.0;
        taken
    }

    /// Pollution from gathering resources on this cell
    pub fn add_production_pollution(&mut self, sugar: f64, spice: f64, config: &PollutionConfig) {
        self.pollution += sugar * config.sugar_production + spice * config.spice_production;
    }

    /// Pollution from metabolizing on this cell
    pub fn add_consumption_pollution(&mut self, sugar: f64, spice: f64, config: &PollutionConfig) {
        self.pollution += sugar * config.sugar_consumption + spice * config.spice_consumption;
    }

    #[inline]
    pub fn occupant(&self) -> Option<AgentId> {
        self.occupant
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.occupant.is_some()
    }

    /// Only the environment links cells and agents, so the two sides stay in step
    pub(crate) fn set_occupant(&mut self, agent: AgentId) -> Result<()> {
        match self.occupant {
            Some(occupant) if occupant != agent => Err(SimError::DoubleOccupancy {
                cell: self.id,
                occupant,
                agent,
            }),
            _ => {
                self.occupant = Some(agent);
                Ok(())
            }
        }
    }

    pub(crate) fn clear_occupant(&mut self, agent: AgentId) -> Result<()> {
        match self.occupant {
            Some(occupant) if occupant == agent => {
                self.occupant = None;
                Ok(())
            }
            _ => Err(SimError::OccupancyMismatch {
                agent,
                cell: self.id,
            }),
        }
    }

    /// Neighbour in a direction, if any
    pub fn neighbor(&self, direction: Direction) -> Option<CellId> {
        self.neighbors
            .iter()
            .find(|(dir, _)| *dir == direction)
            .map(|&(_, id)| id)
    }

    /// All neighbours in direction order
    pub fn neighbors(&self) -> impl Iterator<Item = CellId> + '_ {
        self.neighbors.iter().map(|&(_, id)| id)
    }

    /// Cells in one distance bucket
    pub fn range(&self, distance: u32) -> &[CellId] {
        self.ranges.get(&distance).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cells within `distance` (bucket 1 upwards), nearest first
    pub fn cells_within(&self, distance: u32) -> impl Iterator<Item = (u32, CellId)> + '_ {
        self.ranges
            .range(1..=distance)
            .flat_map(|(&d, cells)| cells.iter().map(move |&id| (d, id)))
    }

    /// Check `0 <= stock <= capacity`
    pub fn check_stock(&self) -> Result<()> {
        if !(0.0..=self.max_sugar).contains(&self.sugar) {
            return Err(SimError::StockOutOfBounds {
                cell: self.id,
                resource: "sugar",
                stock: self.sugar,
                capacity: self.max_sugar,
            });
        }
        if !(0.0..=self.max_spice).contains(&self.spice) {
            return Err(SimError::StockOutOfBounds {
                cell: self.id,
                resource: "spice",
                stock: self.spice,
                capacity: self.max_spice,
            });
        }
        Ok(())
    }
}

/// Read-only view of a cell for external collaborators
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: CellId,
    pub x: usize,
    pub y: usize,
    pub sugar: f64,
    pub spice: f64,
    pub max_sugar: f64,
    pub max_spice: f64,
    pub pollution: f64,
    pub season: Season,
    /// Regrowth during the last environment update
    pub sugar_produced: f64,
    pub spice_produced: f64,
    pub occupant: Option<AgentId>,
}

impl From<&Cell> for CellSnapshot {
    fn from(cell: &Cell) -> Self {
        Self {
            id: cell.id,
            x: cell.x,
            y: cell.y,
            sugar: cell.sugar,
            spice: cell.spice,
            max_sugar: cell.max_sugar,
            max_spice: cell.max_spice,
            pollution: cell.pollution,
            season: cell.season,
            sugar_produced: cell.sugar_produced,
            spice_produced: cell.spice_produced,
            occupant: cell.occupant,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regrow_caps_at_capacity() {
        let mut cell = Cell::new(0, 0, 0);
        cell.set_capacity(4.0, 0.0);
        cell.harvest();
        assert_eq!(cell.regrow_sugar(3.0), 3.0);
        assert_eq!(cell.sugar(), 3.0);
        assert_eq!(cell.regrow_sugar(3.0), 1.0);
        assert_eq!(cell.sugar(), 4.0);
        assert_eq!(cell.regrow_sugar(3.0), 0.0);
        assert!(cell.check_stock().is_ok());
    }

    #[test]
    fn test_harvest_empties_cell() {
        let mut cell = Cell::new(0, 0, 0);
        cell.set_capacity(4.0, 2.0);
        assert_eq!(cell.harvest(), (4.0, 2.0));
        assert_eq!(cell.wealth(), 0.0);
        assert_eq!(cell.max_wealth(), 6.0);
    }

    #[test]
    fn test_occupancy_rejects_second_agent() {
        let mut cell = Cell::new(3, 1, 1);
        cell.set_occupant(7).unwrap();
        assert!(cell.set_occupant(7).is_ok());
        assert!(matches!(
            cell.set_occupant(8),
            Err(SimError::DoubleOccupancy { occupant: 7, agent: 8, .. })
        ));
        assert!(cell.clear_occupant(8).is_err());
        cell.clear_occupant(7).unwrap();
        assert!(!cell.is_occupied());
    }

    #[test]
    fn test_pollution_accrual() {
        let config = PollutionConfig {
            sugar_consumption: 0.5,
            spice_consumption: 1.0,
            sugar_production: 2.0,
            spice_production: 0.0,
            ..PollutionConfig::default()
        };
        let mut cell = Cell::new(0, 0, 0);
        cell.add_consumption_pollution(2.0, 1.0, &config);
        assert!((cell.pollution - 2.0).abs() < 1e-9);
        cell.add_production_pollution(1.0, 5.0, &config);
        assert!((cell.pollution - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_season_flip() {
        assert_eq!(Season::Wet.flip(), Season::Dry);
        assert_eq!(Season::Dry.flip(), Season::Wet);
        assert_eq!(Season::None.flip(), Season::None);
    }
}
