//! CKB cell collection.
//!
//! The indexer is an external collaborator behind the [`Collector`] trait.
//! [`MemoryCollector`] serves tests and offline tooling.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::RwLock;

use crate::ckb::types::{LiveCell, OutPoint, Script};
use crate::error::{Error, Result};
use crate::selector::{select_inputs, CandidateFilter, Selection};
use crate::utils::hex::to_hex;

// ═══════════════════════════════════════════════════════════════════════════════
// QUERY
// ═══════════════════════════════════════════════════════════════════════════════

/// Constraint on a cell's type script
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    /// Any type script, or none
    #[default]
    Any,
    /// No type script and empty data
    Empty,
    /// Exactly this type script
    Exact(Script),
}

/// Live cell query by lock and type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellQuery {
    /// Lock script of the cells
    pub lock: Script,
    /// Type constraint
    pub type_filter: TypeFilter,
}

impl CellQuery {
    /// Plain capacity cells of `lock`
    pub fn capacity(lock: Script) -> Self {
        Self {
            lock,
            type_filter: TypeFilter::Empty,
        }
    }

    /// Cells of `lock` carrying `type_script`
    pub fn asset(lock: Script, type_script: Script) -> Self {
        Self {
            lock,
            type_filter: TypeFilter::Exact(type_script),
        }
    }

    /// All cells of `lock`
    pub fn by_lock(lock: Script) -> Self {
        Self {
            lock,
            type_filter: TypeFilter::Any,
        }
    }

    /// Whether `cell` satisfies the query
    pub fn matches(&self, cell: &LiveCell) -> bool {
        if cell.output.lock != self.lock {
            return false;
        }
        match &self.type_filter {
            TypeFilter::Any => true,
            TypeFilter::Empty => cell.is_empty_cell(),
            TypeFilter::Exact(type_script) => cell.has_type(type_script),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTOR TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of live cells
#[async_trait]
pub trait Collector: Send + Sync {
    /// Live cells matching `query`, in indexer order
    async fn get_cells(&self, query: &CellQuery) -> Result<Vec<LiveCell>>;

    /// The live cell at `out_point`, if still unspent
    async fn get_live_cell(&self, out_point: &OutPoint) -> Result<Option<LiveCell>>;

    /// Select capacity cells covering `target + fee`
    fn collect_inputs(
        &self,
        cells: &[LiveCell],
        target: u64,
        fee: u64,
        filter: Option<&dyn CandidateFilter<LiveCell>>,
    ) -> Result<Selection<LiveCell>> {
        select_inputs(cells, target, fee, filter)
    }
}

/// Capacity cells of `lock`; fails with [`Error::NoLiveCell`] when there are none
pub async fn capacity_cells(collector: &dyn Collector, lock: &Script) -> Result<Vec<LiveCell>> {
    let cells: Vec<_> = collector
        .get_cells(&CellQuery::capacity(lock.clone()))
        .await?
        .into_iter()
        .filter(LiveCell::is_empty_cell)
        .collect();
    if cells.is_empty() {
        return Err(Error::NoLiveCell(format!(
            "no empty cells for lock args {}",
            to_hex(&lock.args)
        )));
    }
    Ok(cells)
}

/// Asset cells of `lock` carrying `type_script`; fails with
/// [`Error::NoMatchingAssetCell`] when there are none
pub async fn asset_cells(
    collector: &dyn Collector,
    lock: &Script,
    type_script: &Script,
) -> Result<Vec<LiveCell>> {
    let cells: Vec<_> = collector
        .get_cells(&CellQuery::asset(lock.clone(), type_script.clone()))
        .await?
        .into_iter()
        .filter(|cell| cell.has_type(type_script))
        .collect();
    if cells.is_empty() {
        return Err(Error::NoMatchingAssetCell {
            asset: to_hex(&type_script.args),
        });
    }
    Ok(cells)
}

// ═══════════════════════════════════════════════════════════════════════════════
// UDT SELECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// xUDT cells selected by amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtSelection {
    /// Selected cells, in input order
    pub selected: Vec<LiveCell>,
    /// Capacity of the selected cells
    pub sum_capacity: u64,
    /// Token amount of the selected cells
    pub sum_amount: u128,
}

/// Select xUDT cells, in order, until their amount reaches `required`.
///
/// `None` takes every cell.
pub fn collect_udt_inputs(cells: &[LiveCell], required: Option<u128>) -> Result<UdtSelection> {
    let mut selection = UdtSelection {
        selected: Vec::new(),
        sum_capacity: 0,
        sum_amount: 0,
    };

    for cell in cells {
        if let Some(required) = required {
            if selection.sum_amount >= required {
                break;
            }
        }
        selection.sum_amount = selection
            .sum_amount
            .checked_add(cell.udt_amount()?)
            .ok_or_else(|| Error::Overflow {
                operation: "xUDT input amount".into(),
            })?;
        selection.sum_capacity = selection.sum_capacity.saturating_add(cell.capacity());
        selection.selected.push(cell.clone());
    }

    if let Some(required) = required {
        if selection.sum_amount < required {
            return Err(Error::InsufficientAssetAmount {
                required,
                available: selection.sum_amount,
            });
        }
    }

    Ok(selection)
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory collector (for testing and offline use)
#[derive(Debug, Default)]
pub struct MemoryCollector {
    cells: RwLock<Vec<LiveCell>>,
    spent: RwLock<HashSet<OutPoint>>,
}

impl MemoryCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector holding `cells`
    pub fn with_cells(cells: Vec<LiveCell>) -> Self {
        Self {
            cells: RwLock::new(cells),
            spent: RwLock::new(HashSet::new()),
        }
    }

    /// Add a live cell
    pub fn insert(&self, cell: LiveCell) -> Result<()> {
        let mut cells = self.cells.write().map_err(|e| Error::Collector(format!("Lock error: {}", e)))?;
        cells.push(cell);
        Ok(())
    }

    /// Mark a cell as spent
    pub fn spend(&self, out_point: &OutPoint) -> Result<()> {
        let mut spent = self.spent.write().map_err(|e| Error::Collector(format!("Lock error: {}", e)))?;
        spent.insert(out_point.clone());
        Ok(())
    }

    fn live(&self) -> Result<Vec<LiveCell>> {
        let cells = self.cells.read().map_err(|e| Error::Collector(format!("Lock error: {}", e)))?;
        let spent = self.spent.read().map_err(|e| Error::Collector(format!("Lock error: {}", e)))?;
        Ok(cells
            .iter()
            .filter(|c| !spent.contains(&c.out_point))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Collector for MemoryCollector {
    async fn get_cells(&self, query: &CellQuery) -> Result<Vec<LiveCell>> {
        Ok(self.live()?.into_iter().filter(|c| query.matches(c)).collect())
    }

    async fn get_live_cell(&self, out_point: &OutPoint) -> Result<Option<LiveCell>> {
        Ok(self.live()?.into_iter().find(|c| &c.out_point == out_point))
    }
}
