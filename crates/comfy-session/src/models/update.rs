use serde::{Deserialize, Serialize};

/// Enum of possible engine update messages received over the websocket.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum Update {
    /// Enum variant representing a queue status update.
    Status { status: Status },
    /// Enum variant representing a sampling progress update.
    Progress(Progress),
    /// Enum variant representing an execution start update.
    ExecutionStart(ExecutionStart),
    /// Enum variant representing an executing update. A `node` of `None`
    /// signals that the prompt has finished executing.
    Executing(Executing),
    /// Enum variant representing a node executed update.
    Executed(Executed),
    /// Enum variant representing an execution cached update.
    ExecutionCached(ExecutionCached),
    /// Enum variant representing an execution interrupted update.
    ExecutionInterrupted(ExecutionInterrupted),
    /// Enum variant representing an execution error update.
    ExecutionError(ExecutionError),
}

/// Struct representing a queue status update.
#[derive(Serialize, Deserialize, Debug)]
pub struct Status {
    /// The current execution information.
    pub exec_info: ExecInfo,
}

/// Struct representing execution information.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecInfo {
    /// Number of items remaining in the queue.
    pub queue_remaining: u64,
}

/// Struct representing a sampling progress update.
#[derive(Serialize, Deserialize, Debug)]
pub struct Progress {
    /// The current progress value.
    pub value: u64,
    /// The maximum progress value.
    pub max: u64,
}

/// Struct representing an execution start update.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutionStart {
    /// The prompt id.
    pub prompt_id: uuid::Uuid,
}

/// Struct representing an executing update.
#[derive(Serialize, Deserialize, Debug)]
pub struct Executing {
    /// The prompt id.
    pub prompt_id: Option<uuid::Uuid>,
    /// The node that is executing, or `None` once the prompt is done.
    pub node: Option<String>,
}

/// Struct representing a node executed update.
#[derive(Serialize, Deserialize, Debug)]
pub struct Executed {
    /// The prompt id.
    pub prompt_id: uuid::Uuid,
    /// The node that was executed.
    pub node: String,
    /// The output of the node.
    pub output: serde_json::Value,
}

/// Struct representing an execution cached update.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutionCached {
    /// The prompt id.
    pub prompt_id: uuid::Uuid,
    /// The ids of the nodes that were cached.
    pub nodes: Vec<String>,
}

/// Struct representing an execution interrupted update.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutionInterrupted {
    /// The prompt id.
    pub prompt_id: uuid::Uuid,
    /// The node that was executing when the prompt was interrupted.
    pub node_id: Option<String>,
    /// The type of the node that was executing.
    pub node_type: Option<String>,
}

/// Struct representing an execution error update.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecutionError {
    /// The prompt id.
    pub prompt_id: uuid::Uuid,
    /// The node that raised the error.
    pub node_id: Option<String>,
    /// The type of the node that raised the error.
    pub node_type: Option<String>,
    /// The error message.
    pub exception_message: Option<String>,
    /// The error type.
    pub exception_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_finished_executing_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "type": "executing",
                "data": {
                    "node": null,
                    "prompt_id": "00000000-0000-0000-0000-000000000001"
                }
            }"#,
        )
        .unwrap();
        match update {
            Update::Executing(executing) => {
                assert!(executing.node.is_none());
                assert!(executing.prompt_id.is_some());
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn parses_status_update() {
        let update: Update = serde_json::from_str(
            r#"{
                "type": "status",
                "data": { "status": { "exec_info": { "queue_remaining": 2 } } }
            }"#,
        )
        .unwrap();
        match update {
            Update::Status { status } => assert_eq!(status.exec_info.queue_remaining, 2),
            other => panic!("unexpected update: {other:?}"),
        }
    }
}
