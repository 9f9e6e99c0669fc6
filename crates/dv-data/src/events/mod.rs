//! Lifecycle events emitted by tables and modifiers

use dv_core::events::{EventDetail, EventEmitter};

use crate::table::DataTable;

/// Events emitted around every modifier execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierEventKind {
    Execute,
    AfterExecute,
}

/// Payload delivered to modifier event handlers
#[derive(Debug, Clone, Copy)]
pub struct ModifierEvent<'a> {
    pub kind: ModifierEventKind,
    pub detail: Option<&'a EventDetail>,
    /// Table the modifier is working on
    pub table: &'a DataTable,
}

pub type ModifierHandler = dyn FnMut(&ModifierEvent<'_>) + Send;

/// Emitter owned by every modifier
pub type ModifierEvents = EventEmitter<ModifierEventKind, ModifierHandler>;

/// Events emitted by table mutations. Each operation emits its plain kind
/// before the change and the `After*` kind once the change, including the
/// derived table update, is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableEventKind {
    SetCell,
    AfterSetCell,
    SetColumns,
    AfterSetColumns,
    SetRows,
    AfterSetRows,
    DeleteRows,
    AfterDeleteRows,
    DeleteColumns,
    AfterDeleteColumns,
    RenameColumn,
    AfterRenameColumn,
    SetModifier,
    AfterSetModifier,
}

/// Payload delivered to table event handlers
#[derive(Debug, Clone, Copy)]
pub struct TableEvent<'a> {
    pub kind: TableEventKind,
    pub detail: Option<&'a EventDetail>,
    pub table: &'a DataTable,
}

pub type TableHandler = dyn FnMut(&TableEvent<'_>) + Send;

/// Emitter owned by every table
pub type TableEvents = EventEmitter<TableEventKind, TableHandler>;
