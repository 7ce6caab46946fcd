use serde::{Deserialize, Serialize};

use crate::decision::Task;

/// One prior exchange supplied by the chat-history collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: String::new(),
            task: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_without_answer_or_task() {
        let json = r#"{"question": "production for january"}"#;
        let turn: ConversationTurn = serde_json::from_str(json).unwrap();
        assert_eq!(turn.question, "production for january");
        assert!(turn.answer.is_empty());
        assert!(turn.task.is_none());
    }
}
