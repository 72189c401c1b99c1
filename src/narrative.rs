//! Narrative composite scoring
//!
//! Blends four indicators into the narrative-strength composite IVN:
//!
//! `IVN = 0.4 * SVE + 0.3 * norm(SNA) + 0.2 * CP + 0.1 * norm(NMI)`
//!
//! SVE and CP are shares in [0, 1]; SNA and NMI are balances in [-1, 1] and
//! are mapped onto [0, 1] first.

use tracing::debug;

use crate::error::ComputeError;
use crate::index::normalize_signed;
use crate::types::{AuxiliaryIndicators, DayStatus, IndexPoint, NarrativeScore, RiskLevel};

pub const SVE_WEIGHT: f64 = 0.4;
pub const SNA_WEIGHT: f64 = 0.3;
pub const CP_WEIGHT: f64 = 0.2;
pub const NMI_WEIGHT: f64 = 0.1;

/// Scorer for the risk-graded narrative composite
#[derive(Debug, Clone, Copy, Default)]
pub struct NarrativeScorer;

impl NarrativeScorer {
    /// Compute IVN from fully specified indicators
    pub fn score(&self, sve: f64, sna: f64, cp: f64, nmi: f64) -> Result<f64, ComputeError> {
        check_range("sve", sve, 0.0, 1.0)?;
        check_range("sna", sna, -1.0, 1.0)?;
        check_range("cp", cp, 0.0, 1.0)?;
        check_range("nmi", nmi, -1.0, 1.0)?;

        let ivn = SVE_WEIGHT * sve
            + SNA_WEIGHT * normalize_signed(sna)
            + CP_WEIGHT * cp
            + NMI_WEIGHT * normalize_signed(nmi);
        Ok(ivn.clamp(0.0, 1.0))
    }

    /// Risk grade and label for an IVN value
    pub fn classify(ivn: f64) -> (RiskLevel, &'static str) {
        if ivn >= 0.8 {
            (RiskLevel::Low, "dominant narrative")
        } else if ivn >= 0.6 {
            (RiskLevel::LowMedium, "competitive, positive bias")
        } else if ivn >= 0.4 {
            (RiskLevel::Medium, "neutral territory")
        } else if ivn >= 0.2 {
            (RiskLevel::MediumHigh, "weak narrative")
        } else {
            (RiskLevel::High, "narrative in crisis")
        }
    }

    /// Score a series as of its latest point.
    ///
    /// Missing SVE falls back to the latest observed share of conversation and
    /// missing SNA to the latest observed net sentiment. CP and NMI have no
    /// in-series counterpart; without them no score is produced.
    pub fn resolve(
        &self,
        indicators: &AuxiliaryIndicators,
        points: &[IndexPoint],
    ) -> Result<Option<NarrativeScore>, ComputeError> {
        let (Some(cp), Some(nmi)) = (indicators.cp, indicators.nmi) else {
            return Ok(None);
        };
        let Some(latest) = points.last() else {
            return Ok(None);
        };
        let observed = points
            .iter()
            .rev()
            .find(|p| p.status != DayStatus::Missing)
            .unwrap_or(latest);

        let sve = indicators.sve.unwrap_or(observed.icr);
        let sna = indicators.sna.unwrap_or(observed.isn);
        let ivn = self.score(sve, sna, cp, nmi)?;
        let (risk_level, label) = Self::classify(ivn);

        debug!(
            entity_id = %latest.entity_id,
            locale = %latest.locale,
            ivn,
            risk = risk_level.as_str(),
            "narrative scored"
        );

        Ok(Some(NarrativeScore {
            entity_id: latest.entity_id.clone(),
            locale: latest.locale.clone(),
            as_of_date: latest.date,
            sve,
            sna,
            cp,
            nmi,
            ivn,
            risk_level,
            label: label.to_string(),
        }))
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ComputeError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ComputeError::invalid_parameter(
            name,
            format!("must be in [{min}, {max}], got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn point(day: u32, isn: f64, icr: f64, status: DayStatus) -> IndexPoint {
        IndexPoint {
            entity_id: "cand-a".to_string(),
            locale: "mx".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            isn,
            isn_norm: normalize_signed(isn),
            icr,
            icce_raw: 0.5,
            icce_smooth: 0.5,
            momentum: 0.0,
            status,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_competitive_bucket() {
        let scorer = NarrativeScorer;
        let ivn = scorer.score(0.65, 0.3, 0.65, 0.3).unwrap();
        assert!((ivn - 0.65).abs() < 1e-9);
        assert_eq!(
            NarrativeScorer::classify(ivn),
            (RiskLevel::LowMedium, "competitive, positive bias")
        );
    }

    #[test]
    fn test_crisis_bucket() {
        let scorer = NarrativeScorer;
        let ivn = scorer.score(0.1, -0.8, 0.2, -0.2).unwrap();
        assert!((ivn - 0.15).abs() < 1e-9);
        assert_eq!(
            NarrativeScorer::classify(ivn),
            (RiskLevel::High, "narrative in crisis")
        );
    }

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(NarrativeScorer::classify(0.8).0, RiskLevel::Low);
        assert_eq!(NarrativeScorer::classify(0.6).0, RiskLevel::LowMedium);
        assert_eq!(NarrativeScorer::classify(0.4).0, RiskLevel::Medium);
        assert_eq!(NarrativeScorer::classify(0.2).0, RiskLevel::MediumHigh);
        assert_eq!(NarrativeScorer::classify(0.1999).0, RiskLevel::High);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let scorer = NarrativeScorer;
        assert!(scorer.score(1.2, 0.0, 0.5, 0.0).is_err());
        assert!(scorer.score(0.5, -1.5, 0.5, 0.0).is_err());
        assert!(scorer.score(0.5, 0.0, f64::NAN, 0.0).is_err());
        let err = scorer.score(0.5, 0.0, 0.5, 2.0).unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn test_resolve_requires_cp_and_nmi() {
        let points = vec![point(1, 0.1, 0.2, DayStatus::Present)];
        let indicators = AuxiliaryIndicators {
            sve: Some(0.5),
            sna: Some(0.0),
            cp: Some(0.5),
            nmi: None,
        };
        assert_eq!(NarrativeScorer.resolve(&indicators, &points).unwrap(), None);
    }

    #[test]
    fn test_resolve_falls_back_to_observed_day() {
        let points = vec![
            point(1, 0.2, 0.3, DayStatus::Present),
            point(2, 0.0, 0.25, DayStatus::Missing),
        ];
        let indicators = AuxiliaryIndicators {
            sve: None,
            sna: None,
            cp: Some(0.5),
            nmi: Some(0.0),
        };

        let score = NarrativeScorer
            .resolve(&indicators, &points)
            .unwrap()
            .unwrap();
        assert_eq!(score.sve, 0.3);
        assert_eq!(score.sna, 0.2);
        assert_eq!(score.as_of_date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        // 0.4*0.3 + 0.3*0.6 + 0.2*0.5 + 0.1*0.5
        assert!((score.ivn - 0.45).abs() < 1e-9);
        assert_eq!(score.risk_level, RiskLevel::Medium);
        assert_eq!(score.label, "neutral territory");
    }

    #[test]
    fn test_resolve_empty_series() {
        let indicators = AuxiliaryIndicators {
            sve: Some(0.5),
            sna: Some(0.0),
            cp: Some(0.5),
            nmi: Some(0.0),
        };
        assert_eq!(NarrativeScorer.resolve(&indicators, &[]).unwrap(), None);
    }
}
