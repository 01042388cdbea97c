//! HUD pages as JSON tables.
//!
//! The host application owns the HUD data and exposes it through
//! [`HudSource`]. Page `0` is the common table shown on every page; the
//! other pages are the extra tables a client can flip through.

use serde::Serialize;

pub const PATH: &str = "/API/HUD";

/// Supplies HUD tables, row by row.
pub trait HudSource: Send + Sync {
    /// Cells of page `page`, one `Vec` per row. Missing cells are `None`.
    fn prepare_table(&self, page: u32) -> Vec<Vec<Option<String>>>;
}

impl<F> HudSource for F
where
    F: Fn(u32) -> Vec<Vec<Option<String>>> + Send + Sync,
{
    #[inline]
    fn prepare_table(&self, page: u32) -> Vec<Vec<Option<String>>> {
        self(page)
    }
}

/// One table, flattened row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudTable {
    pub n_rows: usize,
    pub n_cols: usize,
    pub values: Vec<Option<String>>,
}

impl HudTable {
    /// Flattens `rows`. Short rows are padded with `None` up to the widest.
    pub fn from_rows(rows: Vec<Vec<Option<String>>>) -> Self {
        let n_rows = rows.len();
        let n_cols = rows.iter().map(Vec::len).max().unwrap_or(0);

        let mut values = Vec::with_capacity(n_rows * n_cols);
        for mut row in rows {
            row.resize(n_cols, None);
            values.extend(row);
        }

        Self {
            n_rows,
            n_cols,
            values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudPages {
    pub n_tables: u32,
    pub common_table: HudTable,
    pub extra_table: Option<HudTable>,
}

/// Answers `key=<page>`.
///
/// Everything after the first `=` is the page number. Without `=`, or with a
/// page that is not an integer, there is no answer.
pub fn api_hud<S: HudSource + ?Sized>(source: &S, params: &str) -> Option<HudPages> {
    let (_, page) = params.split_once('=')?;
    let page: i64 = page.trim().parse().ok()?;

    let common_table = HudTable::from_rows(source.prepare_table(0));

    let extra_table = match u32::try_from(page) {
        Ok(page) if page > 0 => Some(HudTable::from_rows(source.prepare_table(page))),
        _ => None,
    };

    Some(HudPages {
        n_tables: 1 + extra_table.is_some() as u32,
        common_table,
        extra_table,
    })
}
