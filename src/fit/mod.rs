// SPDX-License-Identifier: PMPL-1.0-or-later

//! Model fitting dispatch.
//!
//! Routes each specification to the panel matching its dataset level and
//! collects the fitted models per table. The first failing fit aborts the
//! battery: a partial set of models is never returned.

use crate::engine::{FittedModel, RegressionEngine};
use crate::error::SpecFailure;
use crate::panel::LawPanel;
use crate::spec::{Battery, ModelSpec};
use crate::types::{DatasetLevel, TableId};
use tracing::debug;

/// The two enriched panels of one iteration
#[derive(Debug, Clone)]
pub struct PanelPair<'a> {
    pub jurisdiction: LawPanel<'a>,
    pub sub_jurisdiction: LawPanel<'a>,
}

impl<'a> PanelPair<'a> {
    /// Panel a specification is fit against. Two-way clustered city models
    /// always go to the city panel, one-way clustered state models to the
    /// state panel.
    pub fn for_level(&self, level: DatasetLevel) -> &LawPanel<'a> {
        match level {
            DatasetLevel::Jurisdiction => &self.jurisdiction,
            DatasetLevel::SubJurisdiction => &self.sub_jurisdiction,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelFit {
    pub spec: ModelSpec,
    pub fitted: FittedModel,
}

#[derive(Debug, Clone)]
pub struct TableFit {
    pub table: TableId,
    pub models: Vec<ModelFit>,
}

/// Fit every specification of the battery
pub fn fit_battery<E: RegressionEngine + ?Sized>(
    battery: &Battery,
    panels: &PanelPair<'_>,
    engine: &E,
) -> Result<Vec<TableFit>, SpecFailure> {
    battery
        .tables
        .iter()
        .map(|table| {
            let models = table
                .specs
                .iter()
                .map(|spec| fit_one(spec, panels, engine))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, SpecFailure>(TableFit {
                table: table.table,
                models,
            })
        })
        .collect()
}

fn fit_one<E: RegressionEngine + ?Sized>(
    spec: &ModelSpec,
    panels: &PanelPair<'_>,
    engine: &E,
) -> Result<ModelFit, SpecFailure> {
    let panel = panels.for_level(spec.level);
    debug!(
        table = %spec.table,
        model = spec.model,
        outcome = %spec.outcome,
        level = %spec.level,
        rows = panel.len(),
        "fitting model"
    );
    let fitted = engine.fit(spec, panel).map_err(|source| SpecFailure {
        table: spec.table,
        model: spec.model,
        outcome: spec.outcome.clone(),
        source,
    })?;
    Ok(ModelFit {
        spec: spec.clone(),
        fitted,
    })
}
