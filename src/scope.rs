use crate::value::Value;
use std::collections::HashMap;

/// A string-keyed value map with an optional case-insensitive comparator.
///
/// Lookups fold keys per the engine option; the original spelling of the
/// first writer is preserved and is what iteration yields.
#[derive(Clone, Debug)]
pub(crate) struct FieldMap {
    case_insensitive: bool,
    entries: HashMap<String, (String, Value)>,
}

impl FieldMap {
    pub(crate) fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            entries: HashMap::new(),
        }
    }

    fn fold(&self, name: &str) -> String {
        if self.case_insensitive {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    pub(crate) fn insert(&mut self, name: &str, value: Value) {
        let key = self.fold(name);
        match self.entries.get_mut(&key) {
            Some(slot) => slot.1 = value,
            None => {
                self.entries.insert(key, (name.to_string(), value));
            }
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&self.fold(name)).map(|(_, v)| v)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&self.fold(name))
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.values().map(|(name, v)| (name.as_str(), v))
    }
}

/// Per-execution variable scope: a read-only snapshot of the caller's
/// inputs, and the mutable view that receives `set` assignments.
///
/// `inputs` is never written after construction; `FieldExists` and the
/// function context read it, so a `set` to the same name is invisible
/// there.
pub(crate) struct ExecutionScope {
    pub(crate) inputs: FieldMap,
    pub(crate) fields: FieldMap,
}

impl ExecutionScope {
    pub(crate) fn new(caller_inputs: &HashMap<String, Value>, case_insensitive: bool) -> Self {
        let mut inputs = FieldMap::new(case_insensitive);
        for (name, value) in caller_inputs {
            inputs.insert(name, value.clone());
        }
        let fields = inputs.clone();
        Self { inputs, fields }
    }
}
