//! The three agent roles that turn an idea into a project.

pub mod prompts;

use tracing::info;

use crate::errors::LlmError;
use crate::llm::{ChatMessage, ChatModel, supports_system_message};
use crate::output::PlanTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Chatbot,
    Planner,
    Developer,
}

impl AgentRole {
    pub fn name(self) -> &'static str {
        match self {
            AgentRole::Chatbot => "chatbot",
            AgentRole::Planner => "planner",
            AgentRole::Developer => "developer",
        }
    }

    pub fn instructions(self) -> &'static str {
        match self {
            AgentRole::Chatbot => prompts::CHATBOT_INSTRUCTIONS,
            AgentRole::Planner => prompts::PLANNER_INSTRUCTIONS,
            AgentRole::Developer => prompts::DEVELOPER_INSTRUCTIONS,
        }
    }

    /// Label for the input when instructions are inlined into the user
    /// message.
    fn input_label(self) -> &'static str {
        match self {
            AgentRole::Chatbot => "User's input",
            AgentRole::Planner => "User Idea",
            AgentRole::Developer => "Task",
        }
    }
}

/// Messages for one call: `[system, user]`, or a single user message with
/// the instructions inlined when `model` has no system role.
pub fn build_messages(role: AgentRole, model: &str, input: &str) -> Vec<ChatMessage> {
    if supports_system_message(model) {
        vec![
            ChatMessage::system(role.instructions()),
            ChatMessage::user(input),
        ]
    } else {
        vec![ChatMessage::user(format!(
            "{}\n\n{}: {}",
            role.instructions(),
            role.input_label(),
            input
        ))]
    }
}

/// The chatbot, planner and developer sharing one model.
pub struct AgentTeam<'a> {
    model: &'a dyn ChatModel,
}

impl<'a> AgentTeam<'a> {
    pub fn new(model: &'a dyn ChatModel) -> Self {
        Self { model }
    }

    async fn ask(&self, role: AgentRole, input: &str) -> Result<String, LlmError> {
        info!(agent = role.name(), model = self.model.model_name(), "calling agent");
        let messages = build_messages(role, self.model.model_name(), input);
        let reply = self.model.complete(&messages).await?;
        Ok(reply.trim().to_string())
    }

    /// Summarize the user's idea.
    pub async fn clarify(&self, idea: &str) -> Result<String, LlmError> {
        self.ask(AgentRole::Chatbot, idea).await
    }

    /// Raw planner response for a clarified idea.
    pub async fn plan(&self, summary: &str) -> Result<String, LlmError> {
        self.ask(AgentRole::Planner, summary).await
    }

    /// Raw developer response for one task.
    pub async fn develop(&self, plan_summary: &str, task: &PlanTask) -> Result<String, LlmError> {
        let input = format!(
            "Project: {}\n\n{}\n\n{}",
            plan_summary, task.name, task.description
        );
        self.ask(AgentRole::Developer, &input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn system_capable_models_get_two_messages() {
        let messages = build_messages(AgentRole::Planner, "gpt-4o-mini", "a todo app");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, prompts::PLANNER_INSTRUCTIONS);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "a todo app");
    }

    #[test]
    fn o1_models_get_inlined_instructions() {
        let messages = build_messages(AgentRole::Chatbot, "o1-mini", "a todo app");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert!(messages[0].content.starts_with(prompts::CHATBOT_INSTRUCTIONS));
        assert!(messages[0].content.ends_with("\n\nUser's input: a todo app"));
    }

    #[test]
    fn each_role_has_its_own_label() {
        let planner = build_messages(AgentRole::Planner, "o1-preview", "x");
        assert!(planner[0].content.ends_with("User Idea: x"));
        let developer = build_messages(AgentRole::Developer, "o1-preview", "y");
        assert!(developer[0].content.ends_with("Task: y"));
    }
}
