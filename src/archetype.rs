//! Behavioral archetype classification
//!
//! An ordered decision list over the feature vector. The first rule whose
//! conditions all hold wins. Confidence combines how far the winner cleared
//! its own thresholds with how strongly any other rule also matched.

use crate::config::ArchetypeSettings;
use crate::features::Extraction;
use crate::sentiment::{SentimentTrend, Trend};
use crate::types::{FeatureVector, ModuleOutcome};
use serde::Serialize;
use tracing::debug;

/// Coarse behavioral category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    ImpulsiveChaser,
    FinancialSaboteur,
    StressDriven,
    NightEscapist,
    EmotionalGambler,
    StrategicIllusionist,
    /// No rule matched
    Mixed,
}

impl Archetype {
    pub fn label(&self) -> &'static str {
        match self {
            Archetype::ImpulsiveChaser => "Impulsive chaser",
            Archetype::FinancialSaboteur => "Escalating spender",
            Archetype::StressDriven => "Stress-driven",
            Archetype::NightEscapist => "Night escapist",
            Archetype::EmotionalGambler => "Emotional gambler",
            Archetype::StrategicIllusionist => "Strategic illusionist",
            Archetype::Mixed => "Mixed pattern",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Archetype::ImpulsiveChaser => "Tends to raise stakes after a loss and chase it back.",
            Archetype::FinancialSaboteur => {
                "Spending per episode grows while the abstinence streak stays short."
            }
            Archetype::StressDriven => "Night-time episodes with many different triggers.",
            Archetype::NightEscapist => {
                "Night-time gambling as a way to escape thoughts or loneliness."
            }
            Archetype::EmotionalGambler => {
                "Gambling as a reaction to stress, boredom, loneliness or low mood."
            }
            Archetype::StrategicIllusionist => {
                "Belief in a system or strategy that is supposed to work."
            }
            Archetype::Mixed => "No single behavioral pattern dominates yet.",
        }
    }

    fn insight(&self) -> &'static str {
        match self {
            Archetype::ImpulsiveChaser => {
                "You play when you feel you have to win it back. A pause before the next bet breaks the impulse."
            }
            Archetype::FinancialSaboteur => {
                "Relapse followed by bigger spending feeds itself. Hand financial control to your trusted person during risky periods."
            }
            Archetype::StressDriven => {
                "Episodes follow pressure from several directions at once. Plan your evenings ahead and cut exposure to your triggers."
            }
            Archetype::NightEscapist => {
                "You play when you cannot sleep or feel alone. Set a night-time curfew for your devices."
            }
            Archetype::EmotionalGambler => {
                "Prepare an alternative action for the moment a trigger hits."
            }
            Archetype::StrategicIllusionist => {
                "You play when you feel in control. The house edge always wins in the long run."
            }
            Archetype::Mixed => "Keep logging. The profile gets sharper as the diary grows.",
        }
    }
}

/// Quantity a rule condition reads
#[derive(Debug, Clone, Copy, PartialEq)]
enum Signal {
    EpisodeFrequency,
    SpendingTrend,
    MoodScore,
    NightRatio,
    TriggerDiversity,
    StreakDays,
    /// Share of episodes tagged with at least one emotional trigger
    EmotionalShare,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Cmp {
    AtLeast,
    AtMost,
    Below,
}

#[derive(Debug, Clone, Copy)]
struct Condition {
    signal: Signal,
    cmp: Cmp,
    threshold: f64,
    /// Distance past the threshold that counts as a full clearance
    scale: f64,
}

const fn cond(signal: Signal, cmp: Cmp, threshold: f64, scale: f64) -> Condition {
    Condition {
        signal,
        cmp,
        threshold,
        scale,
    }
}

struct Rule {
    archetype: Archetype,
    conditions: &'static [Condition],
}

/// Decision list, evaluated top to bottom
const RULES: &[Rule] = &[
    Rule {
        archetype: Archetype::ImpulsiveChaser,
        conditions: &[
            cond(Signal::SpendingTrend, Cmp::AtLeast, 1.5, 1.0),
            cond(Signal::EpisodeFrequency, Cmp::AtLeast, 2.0, 4.0),
        ],
    },
    Rule {
        archetype: Archetype::FinancialSaboteur,
        conditions: &[
            cond(Signal::SpendingTrend, Cmp::AtLeast, 1.3, 1.0),
            cond(Signal::StreakDays, Cmp::Below, 7.0, 7.0),
        ],
    },
    Rule {
        archetype: Archetype::StressDriven,
        conditions: &[
            cond(Signal::NightRatio, Cmp::AtLeast, 0.3, 0.3),
            cond(Signal::TriggerDiversity, Cmp::AtLeast, 3.0, 3.0),
        ],
    },
    Rule {
        archetype: Archetype::NightEscapist,
        conditions: &[
            cond(Signal::NightRatio, Cmp::AtLeast, 0.3, 0.3),
            cond(Signal::MoodScore, Cmp::AtMost, 2.5, 1.5),
        ],
    },
    Rule {
        archetype: Archetype::EmotionalGambler,
        conditions: &[
            cond(Signal::EmotionalShare, Cmp::AtLeast, 0.5, 0.5),
            cond(Signal::EpisodeFrequency, Cmp::AtLeast, 1.0, 3.0),
        ],
    },
    Rule {
        archetype: Archetype::StrategicIllusionist,
        conditions: &[
            cond(Signal::TriggerDiversity, Cmp::AtLeast, 4.0, 2.0),
            cond(Signal::MoodScore, Cmp::AtLeast, 2.5, 1.0),
            cond(Signal::MoodScore, Cmp::AtMost, 4.0, 1.0),
        ],
    },
];

/// Values the rules are evaluated against
#[derive(Debug, Clone, Copy)]
pub struct ArchetypeInputs {
    pub features: FeatureVector,
    pub emotional_share: f64,
}

impl ArchetypeInputs {
    pub fn from_extraction(extraction: &Extraction) -> Self {
        let episodes = &extraction.episodes;
        let emotional = episodes
            .iter()
            .filter(|e| e.triggers.iter().any(|t| t.is_emotional()))
            .count();
        let emotional_share = if episodes.is_empty() {
            0.0
        } else {
            emotional as f64 / episodes.len() as f64
        };
        Self {
            features: extraction.features,
            emotional_share,
        }
    }

    fn value(&self, signal: Signal) -> f64 {
        let f = &self.features;
        match signal {
            Signal::EpisodeFrequency => f.episode_frequency,
            Signal::SpendingTrend => f.spending_trend,
            Signal::MoodScore => f.mood_score,
            Signal::NightRatio => f.night_activity_ratio,
            Signal::TriggerDiversity => f.trigger_diversity,
            Signal::StreakDays => f.streak_days,
            Signal::EmotionalShare => self.emotional_share,
        }
    }
}

/// Output of the archetype classifier
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchetypeProfile {
    pub archetype: Archetype,
    pub label: &'static str,
    pub description: &'static str,
    pub insight: String,
    /// 0-1, zero for the mixed pattern
    pub confidence: f64,
    /// Every rule that matched, in decision-list order
    pub matched: Vec<Archetype>,
}

/// Rule-based archetype classifier
#[derive(Debug, Clone)]
pub struct ArchetypeClassifier {
    settings: ArchetypeSettings,
}

impl ArchetypeClassifier {
    pub fn new(settings: ArchetypeSettings) -> Self {
        Self { settings }
    }

    pub fn classify(
        &self,
        inputs: &ArchetypeInputs,
        sentiment: Option<&SentimentTrend>,
    ) -> ModuleOutcome<ArchetypeProfile> {
        let episodes = inputs.features.episode_frequency;
        if episodes < self.settings.min_episodes as f64 {
            return ModuleOutcome::insufficient(format!(
                "needs at least {} episodes in the window, found {}",
                self.settings.min_episodes, episodes
            ));
        }

        let matches: Vec<(Archetype, f64)> = RULES
            .iter()
            .filter_map(|rule| clearance(rule, inputs).map(|c| (rule.archetype, c)))
            .collect();

        let (archetype, confidence) = match matches.split_first() {
            Some((&(winner, winner_clearance), rest)) => {
                let runner_up = rest.iter().map(|(_, c)| *c).fold(0.0, f64::max);
                let confidence = (0.5 + 0.5 * winner_clearance) * (1.0 - 0.5 * runner_up);
                (winner, (confidence * 100.0).round() / 100.0)
            }
            None => (Archetype::Mixed, 0.0),
        };

        let mut insight = archetype.insight().to_string();
        if sentiment.is_some_and(|s| s.trend == Trend::Declining) {
            insight.push_str(" Your recent notes are getting darker; this is a good moment to talk to your trusted person.");
        }

        debug!(?archetype, confidence, matched = matches.len(), "classified archetype");

        ModuleOutcome::Ready(ArchetypeProfile {
            archetype,
            label: archetype.label(),
            description: archetype.description(),
            insight,
            confidence,
            matched: matches.into_iter().map(|(a, _)| a).collect(),
        })
    }
}

/// Smallest normalized clearance over a rule's conditions, `None` if any fails
fn clearance(rule: &Rule, inputs: &ArchetypeInputs) -> Option<f64> {
    rule.conditions
        .iter()
        .map(|c| {
            let value = inputs.value(c.signal);
            let margin = match c.cmp {
                Cmp::AtLeast if value >= c.threshold => Some(value - c.threshold),
                Cmp::AtMost if value <= c.threshold => Some(c.threshold - value),
                Cmp::Below if value < c.threshold => Some(c.threshold - value),
                _ => None,
            }?;
            Some((margin / c.scale).min(1.0))
        })
        .try_fold(1.0_f64, |lowest, c| c.map(|c| lowest.min(c)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(values: [f64; 6], emotional_share: f64) -> ArchetypeInputs {
        ArchetypeInputs {
            features: FeatureVector {
                episode_frequency: values[0],
                spending_trend: values[1],
                mood_score: values[2],
                night_activity_ratio: values[3],
                trigger_diversity: values[4],
                streak_days: values[5],
            },
            emotional_share,
        }
    }

    fn classify(inputs: &ArchetypeInputs) -> ArchetypeProfile {
        match ArchetypeClassifier::new(ArchetypeSettings::default()).classify(inputs, None) {
            ModuleOutcome::Ready(profile) => profile,
            other => panic!("expected a profile, got {:?}", other.status()),
        }
    }

    #[test]
    fn test_too_few_episodes_is_insufficient() {
        let classifier = ArchetypeClassifier::new(ArchetypeSettings::default());
        let outcome = classifier.classify(&inputs([2.0, 3.0, 1.0, 1.0, 5.0, 0.0], 1.0), None);
        assert!(matches!(outcome, ModuleOutcome::InsufficientData { .. }));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // matches impulsive chaser and financial saboteur
        let profile = classify(&inputs([6.0, 2.5, 3.0, 0.0, 1.0, 1.0], 0.0));
        assert_eq!(profile.archetype, Archetype::ImpulsiveChaser);
        assert_eq!(
            profile.matched,
            vec![Archetype::ImpulsiveChaser, Archetype::FinancialSaboteur]
        );
        assert_eq!(profile.label, "Impulsive chaser");
    }

    #[test]
    fn test_stress_driven_before_night_escapist() {
        let profile = classify(&inputs([5.0, 1.0, 2.0, 0.6, 4.0, 2.0], 0.0));
        assert_eq!(profile.archetype, Archetype::StressDriven);
        assert!(profile.matched.contains(&Archetype::NightEscapist));
    }

    #[test]
    fn test_scenario_is_night_escapist() {
        let profile = classify(&inputs([3.0, 1.0, 2.0, 1.0 / 3.0, 2.0, 1.0], 1.0));
        assert_eq!(profile.archetype, Archetype::NightEscapist);
        assert_eq!(
            profile.matched,
            vec![Archetype::NightEscapist, Archetype::EmotionalGambler]
        );
        // winner barely cleared night >= 0.3, runner-up cleared by two thirds
        assert!((profile.confidence - 0.37).abs() < 1e-9);
    }

    #[test]
    fn test_decisive_unique_match_is_fully_confident() {
        let profile = classify(&inputs([8.0, 3.0, 3.0, 0.0, 0.0, 20.0], 0.0));
        assert_eq!(profile.archetype, Archetype::ImpulsiveChaser);
        assert_eq!(profile.matched, vec![Archetype::ImpulsiveChaser]);
        assert_eq!(profile.confidence, 1.0);
    }

    #[test]
    fn test_no_match_is_mixed() {
        let profile = classify(&inputs([3.0, 1.0, 3.0, 0.0, 1.0, 2.0], 0.0));
        assert_eq!(profile.archetype, Archetype::Mixed);
        assert_eq!(profile.confidence, 0.0);
        assert!(profile.matched.is_empty());
    }

    #[test]
    fn test_declining_sentiment_extends_insight() {
        let mut trend = SentimentTrend::empty();
        trend.trend = Trend::Declining;
        let classifier = ArchetypeClassifier::new(ArchetypeSettings::default());
        let outcome = classifier.classify(&inputs([3.0, 1.0, 3.0, 0.0, 1.0, 2.0], 0.0), Some(&trend));
        assert!(outcome.ready().unwrap().insight.contains("trusted person"));
    }
}
