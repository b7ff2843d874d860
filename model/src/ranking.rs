//! Combined rankings of the airing series across AniList, MyAnimeList and AniTrendz.

use crate::schedule::Release;
use serde::Serialize;
use std::cmp::Ordering;
use strum::{Display, EnumIter};

/// A signal which contributes to a ranking score.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash, EnumIter, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Metric {
    PopularityRank,
    AnilistScore,
    MalScore,
    AnitrendzRank,
}

impl Metric {
    /// The raw value of this metric for a series, if the series has it.
    fn raw(&self, release: &Release) -> Option<f64> {
        match self {
            Self::PopularityRank => Some(release.popularity_rank)
                .filter(|&rank| rank > 0)
                .map(f64::from),
            Self::AnilistScore => release.anilist_score.map(f64::from),
            Self::MalScore => release.mal.mal_score,
            Self::AnitrendzRank => release.chart.anitrendz_rank.map(f64::from),
        }
    }

    /// The metric's contribution on a 0-100 scale.
    ///
    /// A heavily weighted AniTrendz rank uses a gentler slope, so that the whole chart spreads
    /// across the scale rather than only its top ten.
    fn value(&self, raw: f64, weight: f64) -> f64 {
        match self {
            Self::PopularityRank => (100. - (raw - 1.) * 2.).max(0.),
            Self::AnilistScore => raw,
            Self::MalScore => raw * 10.,
            Self::AnitrendzRank if weight > 0.5 => (100. - (raw - 1.) * 1.2).max(0.),
            Self::AnitrendzRank => (100. - (raw - 1.) * 10.).max(0.),
        }
    }
}

/// Relative weights of each metric in a score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Weights(pub [(Metric, f64); 4]);

impl Weights {
    /// Weights for the all-round score.
    pub const OVERALL: Self = Self([
        (Metric::PopularityRank, 0.25),
        (Metric::AnilistScore, 0.20),
        (Metric::MalScore, 0.30),
        (Metric::AnitrendzRank, 0.25),
    ]);

    /// Weights for this week's buzz, dominated by the weekly chart.
    pub const WEEKLY: Self = Self([
        (Metric::PopularityRank, 0.10),
        (Metric::AnilistScore, 0.10),
        (Metric::MalScore, 0.15),
        (Metric::AnitrendzRank, 0.65),
    ]);

    pub fn get(&self, metric: Metric) -> f64 {
        self.0
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, weight)| *weight)
            .unwrap_or_default()
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// The weighted average of the metrics a series has, out of 100.
///
/// Missing metrics are left out of the average rather than counted as zero.
pub fn score(release: &Release, weights: &Weights) -> f64 {
    let (total, used) = weights
        .0
        .iter()
        .filter_map(|&(metric, weight)| {
            let raw = metric.raw(release)?;
            Some((metric.value(raw, weight) * weight, weight))
        })
        .fold((0., 0.), |(total, used), (value, weight)| {
            (total + value, used + weight)
        });
    if used > 0. {
        round_to(total / used, 2)
    } else {
        0.
    }
}

/// Per-source contributions to the overall score.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Breakdown {
    pub anilist: f64,
    pub mal: f64,
    pub anitrendz: f64,
}

impl Breakdown {
    pub fn of(release: &Release) -> Self {
        let part = |metric: Metric| {
            let weight = Weights::OVERALL.get(metric);
            metric
                .raw(release)
                .filter(|&raw| raw != 0.)
                .map(|raw| round_to(metric.value(raw, weight) * weight, 1))
                .unwrap_or_default()
        };
        Self {
            anilist: part(Metric::PopularityRank),
            mal: part(Metric::MalScore),
            anitrendz: part(Metric::AnitrendzRank),
        }
    }
}

/// A series with its ranking scores.
#[derive(Clone, Debug, PartialEq)]
pub struct Ranked {
    pub release: Release,
    pub overall: f64,
    pub weekly: f64,
}

impl Ranked {
    pub fn breakdown(&self) -> Breakdown {
        Breakdown::of(&self.release)
    }
}

/// Score every series and order them by overall score, best first.
pub fn rank(releases: &[Release]) -> Vec<Ranked> {
    let mut ranked = releases
        .iter()
        .map(|release| Ranked {
            overall: score(release, &Weights::OVERALL),
            weekly: score(release, &Weights::WEEKLY),
            release: release.clone(),
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.overall.partial_cmp(&a.overall).unwrap_or(Ordering::Equal));
    ranked
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schedule::test::release;

    fn scored(
        id: u64,
        popularity_rank: u32,
        anilist: Option<u32>,
        mal: Option<f64>,
        chart: Option<u32>,
    ) -> Release {
        let mut r = release(id, 0);
        r.popularity_rank = popularity_rank;
        r.anilist_score = anilist;
        r.mal.mal_score = mal;
        r.chart.anitrendz_rank = chart;
        r
    }

    #[test]
    fn test_score_all_metrics() {
        let r = scored(1, 1, Some(85), Some(8.8), Some(1));
        // (100*.25 + 85*.2 + 88*.3 + 100*.25) / 1.0
        assert_eq!(score(&r, &Weights::OVERALL), 93.4);
        // (100*.1 + 85*.1 + 88*.15 + 100*.65) / 1.0
        assert_eq!(score(&r, &Weights::WEEKLY), 96.7);
    }

    #[test]
    fn test_score_skips_missing_metrics() {
        let r = scored(1, 11, None, None, None);
        assert_eq!(score(&r, &Weights::OVERALL), 80.);

        let r = scored(1, 0, None, None, None);
        assert_eq!(score(&r, &Weights::OVERALL), 0.);
    }

    #[test]
    fn test_anitrendz_slope_depends_on_weight() {
        let r = scored(1, 0, None, None, Some(11));
        assert_eq!(score(&r, &Weights::OVERALL), 0.);
        assert_eq!(score(&r, &Weights::WEEKLY), 88.);
    }

    #[test]
    fn test_rank_orders_by_overall() {
        let releases = vec![
            scored(1, 30, Some(60), None, None),
            scored(2, 1, Some(90), Some(9.1), Some(1)),
            scored(3, 5, Some(75), Some(7.5), None),
        ];
        let ranked = rank(&releases);
        assert_eq!(
            ranked.iter().map(|r| r.release.id).collect::<Vec<_>>(),
            [2, 3, 1]
        );
    }

    #[test]
    fn test_breakdown() {
        let r = scored(1, 3, Some(80), Some(8.0), Some(2));
        assert_eq!(
            Breakdown::of(&r),
            Breakdown {
                anilist: 24.,
                mal: 24.,
                anitrendz: 22.5,
            }
        );
        assert_eq!(Breakdown::of(&scored(2, 0, None, None, None)), Breakdown::default());
    }
}
