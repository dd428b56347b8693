//! Per-service agent profiles.
//!
//! The study planner and the exercise generator run the same task-turn
//! machinery; everything that differs between them lives here.

use crate::a2a::types::{AgentCapabilities, AgentCard, AgentSkill};

/// How the task executor builds the artifact attached to a completed turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactMode {
    /// Only the terminal result's content becomes the artifact.
    FinalOnly,
    /// Every streamed increment plus the terminal content is concatenated.
    Accumulate,
}

/// Skill advertised in the agent card.
#[derive(Debug, Clone)]
pub struct SkillProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    pub examples: &'static [&'static str],
}

/// Everything that parameterizes one LLM task-turn service.
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Agent card name
    pub name: &'static str,
    /// Agent card description
    pub description: &'static str,
    /// Agent card version
    pub version: &'static str,
    pub skill: SkillProfile,
    /// Input and output modes
    pub content_types: &'static [&'static str],
    /// System prompt for the reactive agent loop
    pub system_instruction: &'static str,
    /// System prompt for the structured-response step
    pub response_format_instruction: &'static str,
    /// Progress notice emitted when a tool starts; `{tool}` is replaced by its name
    pub tool_notice: &'static str,
    /// Content returned when the final state cannot be classified
    pub fallback_message: &'static str,
    /// Prefix for errors raised while streaming a turn
    pub stream_error_prefix: &'static str,
    pub artifact_name: &'static str,
    pub artifact_description: &'static str,
    pub artifact_mode: ArtifactMode,
    /// Port used when `--port` is not given
    pub default_port: u16,
}

impl AgentProfile {
    /// The study planning assistant.
    pub fn study_planner() -> Self {
        Self {
            name: "Study Planner Agent",
            description: "A smart assistant to help generate structured study plans.",
            version: "1.0.0",
            skill: SkillProfile {
                id: "study_planner",
                name: "Study Planning Assistant",
                description: "Helps users plan their study schedules effectively.",
                tags: &["study", "planning", "education"],
                examples: &[
                    "Lập kế hoạch học tập cho kỳ thi TOEIC trong 4 tuần",
                    "Giúp tôi lên lịch học lập trình mỗi ngày 2 tiếng trong 1 tháng",
                ],
            },
            content_types: &["text", "text/plain"],
            system_instruction: "You are a study planning assistant. Your job is to help users plan their study schedules, recommend study resources, and break down complex topics into manageable learning goals. Be specific, actionable, and encouraging in your recommendations.",
            response_format_instruction: concat!(
                "Select status as \"completed\" if the request is fully addressed and no further input is needed. ",
                "Select status as \"input_required\" if you need more information from the user or are asking a clarifying question. ",
                "Select status as \"error\" if an error occurred or the request cannot be fulfilled."
            ),
            tool_notice: "Using tool: {tool}",
            fallback_message: "We are unable to process your request at the moment. Please try again.",
            stream_error_prefix: "Error during streaming",
            artifact_name: "study_plan",
            artifact_description: "Generated study plan or result.",
            artifact_mode: ArtifactMode::FinalOnly,
            default_port: 10002,
        }
    }

    /// The programming exercise generator.
    pub fn exercise_generator() -> Self {
        Self {
            name: "Exercise Generator Agent",
            description: "An agent that generates programming exercises and outputs them as code files.",
            version: "1.0.0",
            skill: SkillProfile {
                id: "exercise_generator",
                name: "Exercise Generator",
                description: "Generates programming exercises and solutions.",
                tags: &["exercise", "code generation", "education"],
                examples: &[
                    "Viết bài tập Python cho chủ đề đệ quy cấp trung bình",
                    "Tạo bài tập lập trình về thuật toán sắp xếp cho sinh viên năm 2",
                ],
            },
            content_types: &["text/plain", "text"],
            system_instruction: concat!(
                "Bạn là một trợ lý tạo bài tập lập trình thông minh. Hãy tạo ra các bài tập lập trình có chất lượng, đầy đủ, và kèm theo lời giải chi tiết.\n",
                "\n",
                "Yêu cầu:\n",
                "- Tạo bài tập lập trình theo yêu cầu người dùng.\n",
                "- Chỉ tạo bài tập phù hợp với ngôn ngữ lập trình được nêu.\n",
                "- Mỗi bài tập nên gồm: mô tả bài, yêu cầu đầu vào/đầu ra, ví dụ, và đoạn code lời giải.\n",
                "- Toàn bộ kết quả phải ở định dạng code hoàn chỉnh, có thể copy vào file và chạy được ngay.\n",
            ),
            response_format_instruction: concat!(
                "Chọn status là \"completed\" nếu đã hoàn thành bài tập đầy đủ để ghi vào file code. ",
                "Chọn status là \"input_required\" nếu cần thêm thông tin từ người dùng. ",
                "Chọn status là \"error\" nếu gặp lỗi."
            ),
            tool_notice: "# Đang sử dụng công cụ: {tool}",
            fallback_message: "Không thể xử lý yêu cầu của bạn lúc này. Vui lòng thử lại.",
            stream_error_prefix: "Lỗi trong quá trình streaming",
            artifact_name: "generate_assignment",
            artifact_description: "Generated assignment and result",
            artifact_mode: ArtifactMode::Accumulate,
            default_port: 10003,
        }
    }

    /// Human-readable notice for a tool invocation.
    pub fn tool_notice_for(&self, tool: &str) -> String {
        self.tool_notice.replace("{tool}", tool)
    }

    /// Content for an error raised while streaming a turn.
    pub fn stream_error(&self, error: &dyn std::fmt::Display) -> String {
        format!("{}: {}", self.stream_error_prefix, error)
    }

    /// Build the agent card served at the well-known path.
    pub fn agent_card(&self, url: &str) -> AgentCard {
        let content_types: Vec<String> = self.content_types.iter().map(|s| s.to_string()).collect();
        AgentCard {
            name: self.name.to_string(),
            description: self.description.to_string(),
            url: url.to_string(),
            version: self.version.to_string(),
            default_input_modes: content_types.clone(),
            default_output_modes: content_types,
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
                state_transition_history: false,
            },
            skills: vec![AgentSkill {
                id: self.skill.id.to_string(),
                name: self.skill.name.to_string(),
                description: self.skill.description.to_string(),
                tags: self.skill.tags.iter().map(|s| s.to_string()).collect(),
                examples: self.skill.examples.iter().map(|s| s.to_string()).collect(),
            }],
        }
    }
}
