use crate::filter::{self, FilterSet, Selection};
use crate::profile::FilterSpec;
use crate::table::Table;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// How long an idle session is kept
pub const SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Per-user dashboard state
///
/// Holds the loaded table and the last selection of every filter. Selections
/// are overwritten wholesale on each interaction.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub table: Option<Arc<Table>>,
    pub source_name: Option<String>,
    pub sheet_names: Vec<String>,
    selections: HashMap<String, Selection>,
    pub expires_at: SystemTime,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            table: None,
            source_name: None,
            sheet_names: Vec::new(),
            selections: HashMap::new(),
            expires_at: SystemTime::now() + SESSION_DURATION,
        }
    }
}

impl SessionState {
    /// Replace the loaded table; old selections no longer apply
    pub fn load(&mut self, name: impl Into<String>, table: Table, sheet_names: Vec<String>) {
        self.load_shared(name, Arc::new(table), sheet_names);
    }

    /// Like `load`, for a table shared with other sessions
    pub fn load_shared(
        &mut self,
        name: impl Into<String>,
        table: Arc<Table>,
        sheet_names: Vec<String>,
    ) {
        self.table = Some(table);
        self.source_name = Some(name.into());
        self.sheet_names = sheet_names;
        self.selections.clear();
    }

    pub fn remember(&mut self, column: impl Into<String>, selection: Selection) {
        self.selections.insert(column.into(), selection.normalized());
    }

    pub fn last(&self, column: &str) -> Option<&Selection> {
        self.selections.get(column)
    }

    /// The selection to show for a filter
    ///
    /// Defaults to the last value if it is still valid for `options`,
    /// otherwise `Selection::All`.
    pub fn resolve(&self, spec: &FilterSpec, options: &[String]) -> Selection {
        match self.selections.get(&spec.column) {
            Some(sel) if sel.is_valid_for(options) => sel.clone(),
            _ => Selection::All,
        }
    }

    /// Merge a request's selections with remembered ones
    ///
    /// Every filter in `specs` gets either the requested selection or the
    /// remembered one, validated against the table's current options. The
    /// result is remembered and returned in `specs` order.
    pub fn update_filters(
        &mut self,
        table: &Table,
        specs: &[FilterSpec],
        requested: &HashMap<String, Selection>,
    ) -> FilterSet {
        let mut filters = FilterSet::new();
        for spec in specs {
            if !table.has_column(&spec.column) {
                continue;
            }
            if let Some(sel) = requested.get(&spec.column) {
                self.remember(spec.column.clone(), sel.clone());
            }
            let options = filter::options(table, &spec.column);
            let resolved = self.resolve(spec, &options);
            self.remember(spec.column.clone(), resolved.clone());
            filters.set(spec.column.clone(), resolved);
        }
        filters
    }

    /// The remembered selections as a filter set, without validation
    pub fn filters(&self, specs: &[FilterSpec]) -> FilterSet {
        let mut filters = FilterSet::new();
        for spec in specs {
            if let Some(sel) = self.selections.get(&spec.column) {
                filters.set(spec.column.clone(), sel.clone());
            }
        }
        filters
    }

    pub fn touch(&mut self) {
        self.expires_at = SystemTime::now() + SESSION_DURATION;
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= SystemTime::now()
    }
}

/// All live sessions keyed by a random id
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<String, SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session and return its id
    pub fn create(&mut self) -> String {
        self.purge_expired();
        let id = Uuid::new_v4().to_string();
        self.sessions.insert(id.clone(), SessionState::default());
        id
    }

    /// Look up a live session, refreshing its expiry
    pub fn get_mut(&mut self, id: &str) -> Option<&mut SessionState> {
        if self.sessions.get(id)?.is_expired() {
            self.sessions.remove(id);
            return None;
        }
        let state = self.sessions.get_mut(id)?;
        state.touch();
        Some(state)
    }

    pub fn get(&self, id: &str) -> Option<&SessionState> {
        self.sessions.get(id).filter(|s| !s.is_expired())
    }

    pub fn remove(&mut self, id: &str) -> Option<SessionState> {
        self.sessions.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn purge_expired(&mut self) {
        self.sessions.retain(|_, s| !s.is_expired());
    }
}
