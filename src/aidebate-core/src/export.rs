//! Markdown rendering of a debate transcript.

use crate::flow::Side;
use crate::session::DebateSession;

/// Render the full transcript with a header, a legend, and one section per
/// speech. Citations are listed under each speech in footnote order.
pub fn render_markdown(session: &DebateSession) -> String {
    let mut md = String::new();

    md.push_str("# Policy Debate Transcript\n\n");
    md.push_str(&format!("**Topic**: {}\n\n", session.topic()));
    md.push_str(&format!(
        "**Affirmative Model**: {}\n",
        session.binding(Side::Affirmative).model_alias
    ));
    md.push_str(&format!(
        "**Negative Model**: {}\n\n",
        session.binding(Side::Negative).model_alias
    ));
    md.push_str("---\n\n");

    md.push_str("## Legend\n\n");
    md.push_str("### Speech Types\n");
    md.push_str("- **Constructive**: Opening arguments presenting the case\n");
    md.push_str("- **Cross-Examination (CX)**: Question period where opponent challenges arguments\n");
    md.push_str("- **Rebuttal**: Arguments refuting opponent's case\n");
    md.push_str("- **Closing**: Final summary arguments\n\n");

    md.push_str("### Speech Labels\n");
    md.push_str("- **1AC/2AC**: First/Second Affirmative Constructive\n");
    md.push_str("- **1NC/2NC**: First/Second Negative Constructive\n");
    md.push_str("- **1NR/2NR**: First/Second Negative Rebuttal\n");
    md.push_str("- **1AR/2AR**: First/Second Affirmative Rebuttal\n");
    md.push_str("- **CX by [Speaker]**: Cross-examination question\n");
    md.push_str("- **Answer by [Speaker]**: Cross-examination response\n\n");

    md.push_str("### Speaker Positions\n");
    md.push_str("- **1A/2A**: First/Second Affirmative Speaker\n");
    md.push_str("- **1N/2N**: First/Second Negative Speaker\n\n");

    md.push_str("---\n\n");
    md.push_str("## Transcript\n\n");

    for message in session.transcript() {
        if message.is_interjection {
            md.push_str("### [Moderator]\n\n");
            md.push_str(&format!("{}\n\n", message.content));
            md.push_str("---\n\n");
            continue;
        }

        let stance = match message.side {
            Some(Side::Affirmative) => "Affirmative",
            Some(Side::Negative) => "Negative",
            None => "Unknown",
        };
        md.push_str(&format!("### {} ({})\n\n", message.speech_label, stance));
        if let Some(role) = &message.speaker_role {
            md.push_str(&format!("**Speaker**: {role}\n"));
        }
        if let Some(model) = &message.model_alias {
            md.push_str(&format!("**Model**: {model}\n\n"));
        }
        md.push_str(&format!("{}\n\n", message.content));

        if !message.citations.is_empty() {
            md.push_str("**Sources**:\n");
            for citation in &message.citations {
                md.push_str(&format!("{}. {}\n", citation.id, citation.text));
            }
            md.push('\n');
        }

        md.push_str("---\n\n");
    }

    md
}
