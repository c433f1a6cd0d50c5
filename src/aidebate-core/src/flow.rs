//! Policy debate flow definitions.
//!
//! A flow is the fixed, ordered list of speech slots for one debate. It is
//! copied into each session at creation so in-flight debates are unaffected
//! by later format changes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DebateError;

/// Which of the two debate positions a participant argues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    #[serde(rename = "aff")]
    Affirmative,
    #[serde(rename = "neg")]
    Negative,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Affirmative => Side::Negative,
            Side::Negative => Side::Affirmative,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Side::Affirmative => "AFFIRMATIVE",
            Side::Negative => "NEGATIVE",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Affirmative => write!(f, "affirmative"),
            Side::Negative => write!(f, "negative"),
        }
    }
}

/// Category of a speech slot, driving the instructions the speaker receives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SpeechType {
    Constructive,
    CxQuestion,
    CxAnswer,
    Rebuttal,
}

impl SpeechType {
    pub fn display_name(self) -> &'static str {
        match self {
            SpeechType::Constructive => "Constructive",
            SpeechType::CxQuestion => "Cross-Examination",
            SpeechType::CxAnswer => "Cross-Examination Answer",
            SpeechType::Rebuttal => "Rebuttal",
        }
    }
}

/// One position in the debate flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSlot {
    /// Zero-based position in the flow. Immutable once built.
    pub index: usize,
    /// Display label, e.g. "1AC" or "CX by 2N".
    pub label: String,
    pub speech_type: SpeechType,
    /// Which participant delivers this speech.
    pub side: Side,
    /// Speaker position within the team, e.g. "1A" or "2N".
    pub speaker_role: String,
}

impl SpeechSlot {
    /// Closing speeches share the rebuttal type but carry their own
    /// instructions; they are identified by label.
    pub fn is_closing(&self) -> bool {
        self.label.ends_with("Closing")
    }

    /// Speech-type instructions injected into the system prompt. The
    /// wording doubles as output discipline for local models that tend to
    /// narrate their planning.
    pub fn instructions(&self) -> &'static str {
        if self.is_closing() {
            return "This is your CLOSING ARGUMENT. Deliver your final summary directly:\n\
                - Summarize why your side should win this debate\n\
                - Highlight your strongest arguments\n\
                - Point out critical weaknesses in your opponent's case\n\
                - Make your final persuasive appeal\n\
                - Do NOT introduce new evidence or arguments\n\
                - Keep it concise and powerful (2-3 paragraphs maximum)\n\
                - Start immediately with your closing\n";
        }
        match self.speech_type {
            SpeechType::Constructive => {
                "This is a CONSTRUCTIVE speech. Deliver your arguments directly:\n\
                - Introduce NEW arguments supporting your position\n\
                - Present evidence and reasoning\n\
                - Build your case with clear contentions\n\
                - Cite sources with DESCRIPTIVE text: [Source: Harvard Medical School 2023 study] or [Source: USDA nutrition database]\n\
                  NEVER use just numbers like [Source: 1] - always include the actual source name\n\
                - Keep your response concise (aim for 3-5 key points)\n\
                - Start immediately with your first argument\n"
            }
            SpeechType::CxQuestion => {
                "This is CROSS-EXAMINATION. Ask your question directly:\n\
                - Ask ONE strategic question to challenge your opponent's case\n\
                - Focus on exposing weaknesses or contradictions\n\
                - Keep the question clear and direct\n\
                - Do NOT answer - only ask the question\n\
                - Start immediately with your question\n"
            }
            SpeechType::CxAnswer => {
                "You are ANSWERING cross-examination. Respond directly:\n\
                - Answer the question directly and briefly\n\
                - Defend your position\n\
                - Clarify any misunderstandings\n\
                - Stay focused on the question asked\n\
                - Start immediately with your answer\n"
            }
            SpeechType::Rebuttal => {
                "This is a REBUTTAL speech. Deliver your rebuttal directly:\n\
                - Refute your opponent's arguments\n\
                - Extend your own arguments\n\
                - Do NOT introduce brand new arguments\n\
                - Focus on winning key issues in the debate\n\
                - Cite sources with DESCRIPTIVE text: [Source: Harvard Medical School 2023 study] or [Source: USDA nutrition database]\n\
                  NEVER use just numbers like [Source: 1] - always include the actual source name\n\
                - Start immediately with your rebuttal\n"
            }
        }
    }
}

/// The fixed ordered sequence of speech slots for one debate format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    slots: Vec<SpeechSlot>,
}

impl FlowDefinition {
    /// Build a policy-debate flow of the requested size.
    ///
    /// Supported sizes:
    /// - 18: full policy flow (four constructive/CX cycles, four rebuttals,
    ///   two closings)
    /// - 12: one constructive/CX cycle per side, four rebuttals, two closings
    /// - 8: one constructive/CX cycle per side and the two closings
    pub fn policy(size: usize) -> Result<FlowDefinition, DebateError> {
        use Side::{Affirmative as Aff, Negative as Neg};
        use SpeechType::{Constructive, CxAnswer, CxQuestion, Rebuttal};

        let first_cycle = [
            ("1AC", Constructive, Aff, "1A"),
            ("CX by 2N", CxQuestion, Neg, "2N"),
            ("Answer by 1A", CxAnswer, Aff, "1A"),
            ("1NC", Constructive, Neg, "1N"),
            ("CX by 1A", CxQuestion, Aff, "1A"),
            ("Answer by 1N", CxAnswer, Neg, "1N"),
        ];
        let second_cycle = [
            ("2AC", Constructive, Aff, "2A"),
            ("CX by 1N", CxQuestion, Neg, "1N"),
            ("Answer by 2A", CxAnswer, Aff, "2A"),
            ("2NC", Constructive, Neg, "2N"),
            ("CX by 2A", CxQuestion, Aff, "2A"),
            ("Answer by 2N", CxAnswer, Neg, "2N"),
        ];
        let rebuttals = [
            ("1NR", Rebuttal, Neg, "1N"),
            ("1AR", Rebuttal, Aff, "1A"),
            ("2NR", Rebuttal, Neg, "2N"),
            ("2AR", Rebuttal, Aff, "2A"),
        ];
        let closings = [
            ("Affirmative Closing", Rebuttal, Aff, "2A"),
            ("Negative Closing", Rebuttal, Neg, "2N"),
        ];

        let template: Vec<(&str, SpeechType, Side, &str)> = match size {
            8 => first_cycle.iter().chain(closings.iter()).copied().collect(),
            12 => first_cycle
                .iter()
                .chain(rebuttals.iter())
                .chain(closings.iter())
                .copied()
                .collect(),
            18 => first_cycle
                .iter()
                .chain(second_cycle.iter())
                .chain(rebuttals.iter())
                .chain(closings.iter())
                .copied()
                .collect(),
            other => {
                return Err(DebateError::Config(format!(
                    "Unsupported flow size: {other}. Supported sizes: 8, 12, 18"
                )));
            }
        };

        let slots = template
            .into_iter()
            .enumerate()
            .map(|(index, (label, speech_type, side, speaker_role))| SpeechSlot {
                index,
                label: label.to_string(),
                speech_type,
                side,
                speaker_role: speaker_role.to_string(),
            })
            .collect();

        Ok(FlowDefinition { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> Option<&SpeechSlot> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[SpeechSlot] {
        &self.slots
    }

    /// Flow sizes this build supports.
    pub fn supported_sizes() -> &'static [usize] {
        &[8, 12, 18]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_flow_sizes() {
        for size in [8, 12, 18] {
            let flow = FlowDefinition::policy(size).unwrap();
            assert_eq!(flow.len(), size, "flow size {size}");
        }
    }

    #[test]
    fn test_policy_flow_contiguous_indices() {
        for size in [8, 12, 18] {
            let flow = FlowDefinition::policy(size).unwrap();
            for (i, slot) in flow.slots().iter().enumerate() {
                assert_eq!(slot.index, i);
            }
        }
    }

    #[test]
    fn test_policy_flow_unsupported_size() {
        for size in [0, 4, 10, 16, 20] {
            assert!(matches!(
                FlowDefinition::policy(size),
                Err(DebateError::Config(_))
            ));
        }
    }

    #[test]
    fn test_full_flow_order() {
        let flow = FlowDefinition::policy(18).unwrap();
        assert_eq!(flow.slot(0).unwrap().label, "1AC");
        assert_eq!(flow.slot(0).unwrap().side, Side::Affirmative);
        assert_eq!(flow.slot(1).unwrap().label, "CX by 2N");
        assert_eq!(flow.slot(1).unwrap().side, Side::Negative);
        assert_eq!(flow.slot(12).unwrap().label, "1NR");
        assert_eq!(flow.slot(12).unwrap().speech_type, SpeechType::Rebuttal);
        assert_eq!(flow.slot(17).unwrap().label, "Negative Closing");
        assert_eq!(flow.slot(17).unwrap().speaker_role, "2N");
    }

    #[test]
    fn test_every_flow_ends_with_closings() {
        for size in [8, 12, 18] {
            let flow = FlowDefinition::policy(size).unwrap();
            let last = flow.slot(size - 1).unwrap();
            let second_last = flow.slot(size - 2).unwrap();
            assert!(last.is_closing());
            assert!(second_last.is_closing());
            assert_eq!(second_last.side, Side::Affirmative);
            assert_eq!(last.side, Side::Negative);
        }
    }

    #[test]
    fn test_closing_slots_get_closing_instructions() {
        let flow = FlowDefinition::policy(8).unwrap();
        let closing = flow.slot(7).unwrap();
        assert!(closing.instructions().contains("CLOSING ARGUMENT"));

        let flow = FlowDefinition::policy(12).unwrap();
        let rebuttal = flow.slot(6).unwrap();
        assert!(rebuttal.instructions().contains("REBUTTAL"));
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Affirmative.opponent(), Side::Negative);
        assert_eq!(Side::Negative.opponent(), Side::Affirmative);
    }
}
