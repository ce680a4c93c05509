use crate::catalog::StepSpec;
use crate::error::{QuickloadError, Result};
use clap::ValueEnum;

/// Parameter passed to every workplan function on the line
const DEFAULT_PARAMETER: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Workpiece {
    Red,
    Black,
    Silver,
}

impl Workpiece {
    pub fn label(self) -> &'static str {
        match self {
            Workpiece::Red => "Red workpiece",
            Workpiece::Black => "Black workpiece",
            Workpiece::Silver => "Silver workpiece",
        }
    }

    fn step(self) -> StepSpec {
        match self {
            Workpiece::Red => StepSpec::new("RR", DEFAULT_PARAMETER, "release red workpiece"),
            Workpiece::Black => StepSpec::new("RB", DEFAULT_PARAMETER, "release black workpiece"),
            Workpiece::Silver => {
                StepSpec::new("RS", DEFAULT_PARAMETER, "release silver workpiece")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Distribution {
    National,
    International,
}

impl Distribution {
    pub fn label(self) -> &'static str {
        match self {
            Distribution::National => "National distribution",
            Distribution::International => "International distribution",
        }
    }

    fn step(self) -> StepSpec {
        match self {
            Distribution::National => {
                StepSpec::new("SN", DEFAULT_PARAMETER, "national distribution")
            }
            Distribution::International => {
                StepSpec::new("SI", DEFAULT_PARAMETER, "international distribution")
            }
        }
    }
}

/// Everything an operator selected for one product.
///
/// The form is a plain value: building the workplan from it has no side effects
/// and does not depend on how the selections were collected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub workpiece: Workpiece,
    pub mount_cap: bool,
    pub check_colour: bool,
    pub distribution: Distribution,
}

impl ProductForm {
    /// Returns a copy with surrounding whitespace removed from the text fields,
    /// or an error naming every field left empty.
    pub fn validate(&self) -> Result<ProductForm> {
        let name = self.name.trim();
        let description = self.description.trim();

        let mut missing = Vec::new();
        if name.is_empty() {
            missing.push("name");
        }
        if description.is_empty() {
            missing.push("description");
        }

        if !missing.is_empty() {
            return Err(QuickloadError::FormValidation(format!(
                "all fields must be filled out first (missing: {})",
                missing.join(", ")
            )));
        }

        Ok(ProductForm {
            name: name.to_string(),
            description: description.to_string(),
            ..self.clone()
        })
    }

    /// Workplan steps in line order: workpiece, cap, colour check, distribution.
    pub fn build_steps(&self) -> Vec<StepSpec> {
        let mut steps = vec![self.workpiece.step()];
        if self.mount_cap {
            steps.push(StepSpec::new("MC", DEFAULT_PARAMETER, "mount cap"));
        }
        if self.check_colour {
            steps.push(StepSpec::new("CC", DEFAULT_PARAMETER, "check colour"));
        }
        steps.push(self.distribution.step());
        steps
    }

    pub fn summary(&self) -> String {
        let mut selections = vec![self.workpiece.label()];
        if self.mount_cap {
            selections.push("Mount cap");
        }
        if self.check_colour {
            selections.push("Check colour");
        }
        selections.push(self.distribution.label());

        format!("{}: {}", self.name.trim(), selections.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: "  Widget A ".to_string(),
            description: " test ".to_string(),
            workpiece: Workpiece::Red,
            mount_cap: false,
            check_colour: false,
            distribution: Distribution::National,
        }
    }

    #[test]
    fn validate_trims_text_fields() {
        let validated = form().validate().unwrap();
        assert_eq!(validated.name, "Widget A");
        assert_eq!(validated.description, "test");
    }

    #[test]
    fn validate_lists_every_missing_field() {
        let mut blank = form();
        blank.name = "   ".to_string();
        blank.description = String::new();

        let err = blank.validate().unwrap_err();
        assert!(matches!(err, QuickloadError::FormValidation(_)));
        let message = err.to_string();
        assert!(message.contains("name"));
        assert!(message.contains("description"));
    }

    #[test]
    fn minimal_selection_builds_two_steps() {
        let steps = form().build_steps();
        assert_eq!(
            steps,
            vec![
                StepSpec::new("RR", 1, "release red workpiece"),
                StepSpec::new("SN", 1, "national distribution"),
            ]
        );
    }

    #[test]
    fn optional_steps_keep_line_order() {
        let mut full = form();
        full.workpiece = Workpiece::Silver;
        full.mount_cap = true;
        full.check_colour = true;
        full.distribution = Distribution::International;

        let functions: Vec<_> = full
            .build_steps()
            .into_iter()
            .map(|step| step.function)
            .collect();
        assert_eq!(functions, vec!["RS", "MC", "CC", "SI"]);
    }

    #[test]
    fn summary_lists_selections() {
        let mut selected = form();
        selected.mount_cap = true;
        assert_eq!(
            selected.summary(),
            "Widget A: Red workpiece, Mount cap, National distribution"
        );
    }
}
