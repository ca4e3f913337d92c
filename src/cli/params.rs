use clap::Args;

use crate::params::{Assignment, ParameterId, Value};

/// Arguments for the `get` command.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// Parameter names such as `timer_interval_1`; all parameters when omitted.
    #[arg(value_parser = parse_parameter_id)]
    names: Vec<ParameterId>,
}

impl GetArgs {
    /// Creates get arguments for the given parameters.
    #[must_use]
    pub fn new(names: Vec<ParameterId>) -> Self {
        Self { names }
    }

    pub(crate) fn ids(&self) -> &[ParameterId] {
        &self.names
    }
}

/// Arguments for the `set` command.
#[derive(Debug, Args)]
pub struct SetArgs {
    /// `name=value` assignments applied together, e.g. `pump_pulse=16`.
    #[arg(required = true)]
    assignments: Vec<Assignment>,
}

impl SetArgs {
    /// Creates set arguments from parsed assignments.
    ///
    /// ```
    /// use sami::SetArgs;
    ///
    /// let args = SetArgs::new(vec!["pump_pulse=16".parse()?]);
    /// let _ = args;
    /// # Ok::<(), sami::ParameterError>(())
    /// ```
    #[must_use]
    pub fn new(assignments: Vec<Assignment>) -> Self {
        Self { assignments }
    }

    pub(crate) fn into_values(self) -> Vec<(ParameterId, Value)> {
        self.assignments
            .into_iter()
            .map(Assignment::into_parts)
            .collect()
    }
}

fn parse_parameter_id(value: &str) -> Result<ParameterId, String> {
    ParameterId::from_name(value).map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn set_args_keep_assignment_order() {
        let args = SetArgs::new(vec![
            "pump_pulse=16".parse().expect("valid assignment"),
            "num_blank_cycles=0x04".parse().expect("valid assignment"),
        ]);

        assert_eq!(
            vec![
                (ParameterId::PumpPulse, Value::Int(16)),
                (ParameterId::NumBlankCycles, Value::Int(4)),
            ],
            args.into_values()
        );
    }

    #[test]
    fn unknown_parameter_name_is_reported() {
        let error = parse_parameter_id("pump_speed").expect_err("unknown name");
        assert!(error.contains("pump_speed"));
    }
}
