use serde::{Deserialize, Serialize};

use crate::errors::OutputError;
use crate::util::extract_json_object;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Planner output: a summary plus the ordered task list the developer
/// agent works through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub summary: String,
    pub tasks: Vec<PlanTask>,
}

impl Plan {
    /// Parse the first JSON object in `response`.
    pub fn parse(response: &str) -> Result<Self, OutputError> {
        let json = extract_json_object(response).ok_or(OutputError::MissingJson)?;
        let plan: Plan = serde_json::from_str(&json).map_err(OutputError::InvalidJson)?;
        if plan.tasks.is_empty() {
            return Err(OutputError::EmptyPlan);
        }
        Ok(plan)
    }

    /// One task whose description is the whole planner response.
    pub fn single_task(response: &str) -> Self {
        Self {
            summary: String::new(),
            tasks: vec![PlanTask {
                name: "prototype".to_string(),
                description: response.trim().to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plan_inside_prose() {
        let response = r#"Here is the breakdown:
```json
{
  "summary": "Todo app",
  "tasks": [
    {"name": "backend", "description": "Express API with {id} routes"},
    {"name": "frontend"}
  ]
}
```"#;
        let plan = Plan::parse(response).unwrap();
        assert_eq!(plan.summary, "Todo app");
        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].description, "Express API with {id} routes");
        assert_eq!(plan.tasks[1].description, "");
    }

    #[test]
    fn missing_json_is_an_error() {
        assert!(matches!(
            Plan::parse("1. Build the UI\n2. Build the API"),
            Err(OutputError::MissingJson)
        ));
    }

    #[test]
    fn wrong_shape_is_invalid_json() {
        assert!(matches!(
            Plan::parse(r#"{"steps": ["a", "b"]}"#),
            Err(OutputError::InvalidJson(_))
        ));
    }

    #[test]
    fn empty_task_list_is_rejected() {
        assert!(matches!(
            Plan::parse(r#"{"summary": "x", "tasks": []}"#),
            Err(OutputError::EmptyPlan)
        ));
    }

    #[test]
    fn single_task_wraps_raw_text() {
        let plan = Plan::single_task("  1. Build everything\n");
        assert_eq!(plan.tasks.len(), 1);
        assert_eq!(plan.tasks[0].description, "1. Build everything");
    }
}
