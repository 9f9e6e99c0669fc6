//! Run several modifiers in sequence over one working table

use std::sync::Arc;

use dv_core::events::EventDetail;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{modifier_from_json, DataModifier, ModifierJson};
use crate::events::{ModifierEventKind, ModifierEvents};
use crate::table::DataTable;
use crate::DataError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChainModifierOptions {
    pub chain: Vec<ModifierJson>,
    /// Run the chain from last to first
    pub reverse: bool,
}

#[derive(Debug, Default)]
pub struct ChainModifier {
    modifiers: Vec<Arc<dyn DataModifier>>,
    reverse: bool,
    events: ModifierEvents,
}

impl ChainModifier {
    pub const CLASS_NAME: &'static str = "ChainModifier";

    pub fn new(modifiers: Vec<Arc<dyn DataModifier>>) -> Self {
        Self {
            modifiers,
            reverse: false,
            events: ModifierEvents::new(),
        }
    }

    pub fn reversed(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Build the chain from serialized members. Fails on the first member
    /// that cannot be reconstructed.
    pub fn from_options(options: ChainModifierOptions) -> Result<Self, DataError> {
        let modifiers = options
            .chain
            .iter()
            .map(modifier_from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(modifiers).reversed(options.reverse))
    }

    pub fn modifiers(&self) -> &[Arc<dyn DataModifier>] {
        &self.modifiers
    }

    pub fn is_reversed(&self) -> bool {
        self.reverse
    }

    fn run(&self, table: &mut DataTable, detail: Option<&EventDetail>) {
        let mut step = |modifier: &Arc<dyn DataModifier>| {
            modifier.modify(table, detail);
            trace!(modifier = modifier.class_name(), rows = table.get_row_count(), "chain step");
        };
        if self.reverse {
            self.modifiers.iter().rev().for_each(&mut step);
        } else {
            self.modifiers.iter().for_each(&mut step);
        }
    }
}

impl DataModifier for ChainModifier {
    fn class_name(&self) -> &'static str {
        Self::CLASS_NAME
    }

    fn events(&self) -> &ModifierEvents {
        &self.events
    }

    fn apply(&self, table: &mut DataTable) {
        self.run(table, None);
    }

    /// Members receive the caller's detail token as well
    fn modify(&self, table: &mut DataTable, detail: Option<&EventDetail>) {
        self.emit(ModifierEventKind::Execute, table, detail);
        self.run(table, detail);
        self.emit(ModifierEventKind::AfterExecute, table, detail);
    }

    fn to_json(&self) -> ModifierJson {
        let options = ChainModifierOptions {
            chain: self.modifiers.iter().map(|modifier| modifier.to_json()).collect(),
            reverse: self.reverse,
        };
        ModifierJson {
            class: Self::CLASS_NAME.to_string(),
            options: serde_json::to_value(&options).unwrap_or_default(),
        }
    }
}
