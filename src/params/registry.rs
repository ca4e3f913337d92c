use std::collections::BTreeMap;

use tracing::debug;

use super::{ParameterError, ParameterId, Value, entries, entry};
use crate::codec::{ConfigEncoder, InstrumentConfig};

/// Session-owned view of the instrument parameters.
///
/// Reads come from the last decoded configuration, falling back to registry
/// defaults before one has arrived. Writes are staged here and only reach the
/// instrument through a configuration upload.
#[derive(Debug, Clone, Default)]
pub struct ParameterRegistry {
    current: Option<InstrumentConfig>,
    staged: BTreeMap<ParameterId, Value>,
}

impl ParameterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `id`.
    #[must_use]
    pub fn get(&self, id: ParameterId) -> Value {
        match &self.current {
            Some(config) => config.get(id).clone(),
            None => entry(id).default_value().clone(),
        }
    }

    /// Current value of the parameter called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error when no parameter has that name.
    pub fn get_by_name(&self, name: &str) -> Result<Value, ParameterError> {
        ParameterId::from_name(name).map(|id| self.get(id))
    }

    /// Stages one host write.
    ///
    /// # Errors
    ///
    /// Returns an error for read-only parameters or values that do not fit.
    pub fn set(&mut self, id: ParameterId, value: Value) -> Result<(), ParameterError> {
        self.set_many([(id, value)])
    }

    /// Stages several host writes, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure; nothing is staged in that case.
    ///
    /// ```
    /// use sami::{ParameterId, ParameterRegistry, Value};
    ///
    /// let mut registry = ParameterRegistry::new();
    /// let result = registry.set_many([
    ///     (ParameterId::PumpPulse, Value::Int(0x12)),
    ///     (ParameterId::ProgramTime, Value::Int(0)),
    /// ]);
    /// assert!(result.is_err());
    /// assert!(registry.staged().is_empty());
    /// ```
    pub fn set_many(
        &mut self,
        values: impl IntoIterator<Item = (ParameterId, Value)>,
    ) -> Result<(), ParameterError> {
        let values: Vec<(ParameterId, Value)> = values.into_iter().collect();
        for (id, value) in &values {
            let parameter = entry(*id);
            if parameter.is_read_only() {
                return Err(ParameterError::ReadOnly { id: *id });
            }
            parameter.validate(value)?;
        }
        for (id, value) in values {
            debug!(parameter = %id, value = %value, "staging parameter");
            self.staged.insert(id, value);
        }
        Ok(())
    }

    /// Every parameter with its current value.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ParameterId, Value> {
        entries()
            .map(|parameter| (parameter.id(), self.get(parameter.id())))
            .collect()
    }

    /// Values staged since the last upload.
    #[must_use]
    pub fn staged(&self) -> &BTreeMap<ParameterId, Value> {
        &self.staged
    }

    pub fn clear_staged(&mut self) {
        self.staged.clear();
    }

    /// Last decoded configuration, possibly stale.
    #[must_use]
    pub fn config(&self) -> Option<&InstrumentConfig> {
        self.current.as_ref()
    }

    /// Replaces the view with a freshly decoded configuration.
    ///
    /// Returns whether any parameter value changed.
    pub fn apply_config(&mut self, config: InstrumentConfig) -> bool {
        let changed = match &self.current {
            Some(previous) => previous.values() != config.values(),
            None => true,
        };
        self.current = Some(config);
        changed
    }

    /// Staged values spliced over the current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when a staged value no longer fits its field.
    pub fn build_outbound(&self) -> Result<String, ParameterError> {
        ConfigEncoder::encode(&self.staged, self.current.as_ref())
    }

    /// Current configuration with `overrides` spliced in, ignoring access.
    pub(crate) fn build_with(
        &self,
        overrides: &BTreeMap<ParameterId, Value>,
    ) -> Result<String, ParameterError> {
        ConfigEncoder::encode(overrides, self.current.as_ref())
    }
}
