// src/services/scoring.rs

use rust_decimal::Decimal;

use crate::models::feedback::{DecisionPower, LeadQualification, PurchaseHorizon};

pub const MAX_SCORE: u8 = 100;
const BUDGET_BONUS: u8 = 10;

// Entradas do corretor que compõem o score do lead
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringInput {
    pub qualification: LeadQualification,
    pub decision_power: DecisionPower,
    pub purchase_horizon: PurchaseHorizon,
    pub available_budget: Option<Decimal>,
}

pub fn qualification_points(value: LeadQualification) -> u8 {
    match value {
        LeadQualification::Quente => 40,
        LeadQualification::Morno => 25,
        LeadQualification::Frio => 10,
    }
}

pub fn decision_power_points(value: DecisionPower) -> u8 {
    match value {
        DecisionPower::Total => 25,
        DecisionPower::Parcial => 15,
        DecisionPower::Nenhum => 5,
    }
}

pub fn horizon_points(value: PurchaseHorizon) -> u8 {
    match value {
        PurchaseHorizon::UpTo3Months => 25,
        PurchaseHorizon::From3To6Months => 20,
        PurchaseHorizon::From6To12Months => 15,
        PurchaseHorizon::Over12Months => 10,
        PurchaseHorizon::Undefined => 5,
    }
}

/// Score do lead (0-100). Função pura: mesma entrada, mesmo score.
pub fn score(input: &ScoringInput) -> u8 {
    let budget = match input.available_budget {
        Some(value) if value > Decimal::ZERO => BUDGET_BONUS,
        _ => 0,
    };

    let total = qualification_points(input.qualification)
        + decision_power_points(input.decision_power)
        + horizon_points(input.purchase_horizon)
        + budget;

    total.min(MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const QUALIFICATIONS: [(LeadQualification, u8); 3] = [
        (LeadQualification::Quente, 40),
        (LeadQualification::Morno, 25),
        (LeadQualification::Frio, 10),
    ];

    const POWERS: [(DecisionPower, u8); 3] = [
        (DecisionPower::Total, 25),
        (DecisionPower::Parcial, 15),
        (DecisionPower::Nenhum, 5),
    ];

    const HORIZONS: [(PurchaseHorizon, u8); 5] = [
        (PurchaseHorizon::UpTo3Months, 25),
        (PurchaseHorizon::From3To6Months, 20),
        (PurchaseHorizon::From6To12Months, 15),
        (PurchaseHorizon::Over12Months, 10),
        (PurchaseHorizon::Undefined, 5),
    ];

    #[test]
    fn full_input_space_matches_the_table() {
        let budgets = [(Some(Decimal::new(350_000, 0)), 10u8), (None, 0u8)];
        let mut combinations = 0;

        for (qualification, q) in QUALIFICATIONS {
            for (decision_power, d) in POWERS {
                for (purchase_horizon, h) in HORIZONS {
                    for (available_budget, b) in budgets {
                        let input = ScoringInput {
                            qualification,
                            decision_power,
                            purchase_horizon,
                            available_budget,
                        };
                        assert_eq!(score(&input), q + d + h + b, "{:?}", input);
                        combinations += 1;
                    }
                }
            }
        }

        assert_eq!(combinations, 90);
    }

    #[test]
    fn best_lead_scores_exactly_one_hundred() {
        let input = ScoringInput {
            qualification: LeadQualification::Quente,
            decision_power: DecisionPower::Total,
            purchase_horizon: PurchaseHorizon::UpTo3Months,
            available_budget: Some(Decimal::new(500_000, 0)),
        };
        assert_eq!(score(&input), MAX_SCORE);
    }

    #[test]
    fn zero_or_negative_budget_earns_no_bonus() {
        let base = ScoringInput {
            qualification: LeadQualification::Frio,
            decision_power: DecisionPower::Nenhum,
            purchase_horizon: PurchaseHorizon::Undefined,
            available_budget: Some(Decimal::ZERO),
        };
        assert_eq!(score(&base), 20);

        let negative = ScoringInput {
            available_budget: Some(Decimal::new(-1, 0)),
            ..base
        };
        assert_eq!(score(&negative), 20);
    }

    #[test]
    fn score_is_deterministic() {
        let input = ScoringInput {
            qualification: LeadQualification::Morno,
            decision_power: DecisionPower::Total,
            purchase_horizon: PurchaseHorizon::From6To12Months,
            available_budget: Some(Decimal::new(1, 2)),
        };
        assert_eq!(score(&input), score(&input));
        assert_eq!(score(&input), 75);
    }
}
