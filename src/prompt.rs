//! Turns questionnaire state into the instructions sent to the model.

use serde::Serialize;
use tracing::debug;

use crate::questionnaire::QuestionnaireInput;

/// Persona for the advisory document.
pub const ADVISORY_SYSTEM_INSTRUCTION: &str = "Je bent een ervaren procesadviseur voor het \
Nederlandse MKB. Je helpt ondernemers hun administratieve en operationele processen rond \
kantoorsoftware te verbeteren. Schrijf in helder, zakelijk Nederlands, wees concreet en \
praktisch, en baseer je advies uitsluitend op de gegeven situatie.";

/// Persona for the chat page: short conversational answers.
pub const CHAT_SYSTEM_INSTRUCTION: &str = "Je bent een behulpzame procesadviseur voor het MKB. \
Beantwoord vragen kort en to the point in het Nederlands, in hooguit een paar alinea's. \
Vraag om verduidelijking als de vraag onduidelijk is.";

/// Deliverable outline appended to every advisory request.
pub const DELIVERABLE_OUTLINE: &str = "Lever een adviesdocument met de volgende onderdelen:
1. Diagnose van de huidige situatie
2. Top-3 quick wins
3. Gefaseerde aanpak
4. Benodigde tooling
5. Indicatieve planning en rollen
6. Risico's en mitigaties
7. Call to action";

/// Rendered in place of the pain point list when nothing was selected.
pub const NO_PAIN_POINTS_LINE: &str = "- (geen knelpunten geselecteerd)";

/// Rendered in place of empty notes.
pub const NOT_APPLICABLE: &str = "n.v.t.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvisoryRequest {
    pub system_instruction: String,
    pub user_instruction: String,
}

/// Bulleted pain points with their weights, in selection order.
pub fn render_pain_points(input: &QuestionnaireInput) -> String {
    let selected = input.selected_pain_points();
    if selected.is_empty() {
        return NO_PAIN_POINTS_LINE.to_string();
    }
    selected
        .iter()
        .map(|p| format!("- {} (weging {})", p, input.weight_of(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn compose(input: &QuestionnaireInput) -> AdvisoryRequest {
    let notes = match input.notes.trim() {
        "" => NOT_APPLICABLE,
        notes => notes,
    };

    let user_instruction = format!(
        "Software: {}\n\
        Knelpunten en weging (1 = laag, 5 = hoog):\n{}\n\
        Toelichting: {}\n\
        Voorkeursaanpak: {}\n\n\
        {}",
        input.software.trim(),
        render_pain_points(input),
        notes,
        input.approach,
        DELIVERABLE_OUTLINE
    );

    debug!(?user_instruction, "Composed advisory prompt");

    AdvisoryRequest {
        system_instruction: ADVISORY_SYSTEM_INSTRUCTION.to_string(),
        user_instruction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::ApproachPreference;
    use std::collections::BTreeMap;

    fn input(pain_points: &[&str], weights: &[(&str, u8)]) -> QuestionnaireInput {
        QuestionnaireInput {
            software: "Exact Online".to_string(),
            pain_points: pain_points.iter().map(|p| p.to_string()).collect(),
            weights: weights.iter().map(|(k, v)| (k.to_string(), *v)).collect::<BTreeMap<_, _>>(),
            notes: String::new(),
            approach: ApproachPreference::FullService,
        }
    }

    #[test]
    fn test_one_bullet_per_pain_point_with_weight() {
        let request = compose(&input(
            &["Handmatig werk", "Dubbele invoer", "Trage facturatie"],
            &[("Handmatig werk", 5), ("Trage facturatie", 1), ("Niet geselecteerd", 4)],
        ));
        let bullets: Vec<&str> = request
            .user_instruction
            .lines()
            .filter(|l| l.contains("(weging "))
            .collect();
        assert_eq!(
            bullets,
            vec![
                "- Handmatig werk (weging 5)",
                "- Dubbele invoer (weging 3)",
                "- Trage facturatie (weging 1)",
            ]
        );
        assert!(!request.user_instruction.contains("Niet geselecteerd"));
    }

    #[test]
    fn test_empty_pain_points_placeholder() {
        let request = compose(&input(&[], &[]));
        assert!(request.user_instruction.contains(NO_PAIN_POINTS_LINE));
        assert!(!request.user_instruction.contains("(weging"));
    }

    #[test]
    fn test_notes_sentinel_and_passthrough() {
        let mut input = input(&["Handmatig werk"], &[]);
        input.notes = "   ".to_string();
        assert!(compose(&input).user_instruction.contains("Toelichting: n.v.t."));

        input.notes = "Wij werken met 4 mensen".to_string();
        let request = compose(&input);
        assert!(request.user_instruction.contains("Toelichting: Wij werken met 4 mensen"));
        assert!(!request.user_instruction.contains(NOT_APPLICABLE));
    }

    #[test]
    fn test_outline_and_system_instruction_are_fixed() {
        let a = compose(&input(&["Handmatig werk"], &[]));
        let b = compose(&QuestionnaireInput::default());
        assert!(a.user_instruction.ends_with(DELIVERABLE_OUTLINE));
        assert!(b.user_instruction.ends_with(DELIVERABLE_OUTLINE));
        assert_eq!(a.system_instruction, b.system_instruction);
        assert_ne!(a.system_instruction, CHAT_SYSTEM_INSTRUCTION);
        assert!(a.user_instruction.contains("Voorkeursaanpak: Volledig uitbesteden"));
    }
}
