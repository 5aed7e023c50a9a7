use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 出站提示的结构化描述；格式化与发送由外部投递方负责
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Prompt {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<PromptChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PromptChoice {
    pub id: String,
    pub title: String,
}

impl Prompt {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    pub fn with_choices(text: impl Into<String>, choices: Vec<(&str, &str)>) -> Self {
        Self {
            text: text.into(),
            choices: choices
                .into_iter()
                .map(|(id, title)| PromptChoice {
                    id: id.to_string(),
                    title: title.to_string(),
                })
                .collect(),
        }
    }
}

/// 分发结果：duplicate = true 表示该消息已处理过，prompt 为首次处理的记录回放
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchOutcome {
    pub duplicate: bool,
    pub prompt: Prompt,
}
