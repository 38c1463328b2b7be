use serde::Serialize;

/// Input to the generation capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_instruction: String,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, system_instruction: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: system_instruction.into(),
        }
    }
}

/// One unit of a streamed answer, serialized as the JSON payload of a
/// `data:` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnswerEvent {
    Chunk {
        chunk: String,
        full: String,
        complete: bool,
    },
    Error {
        error: String,
    },
}

impl AnswerEvent {
    pub fn delta(chunk: impl Into<String>, full: impl Into<String>) -> Self {
        Self::Chunk {
            chunk: chunk.into(),
            full: full.into(),
            complete: false,
        }
    }

    pub fn complete(full: impl Into<String>) -> Self {
        Self::Chunk {
            chunk: String::new(),
            full: full.into(),
            complete: true,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Text-event-stream framing: `data: <json>` followed by a blank line.
    pub fn to_sse_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("data: {json}\n\n")
    }
}
