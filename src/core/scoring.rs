use crate::models::{CompatibilityResult, ProfileBundle, ScoringWeights, SleepSchedule};

/// Compute the compatibility score (0-100) for two profile bundles
///
/// Each dimension contributes up to its configured weight:
/// cleanliness, sleep schedule, noise tolerance and guest frequency are
/// closeness comparisons on shared scales; smoking and pets are
/// agreement checks; diet, hobbies, languages and target neighborhoods
/// are set overlaps; budget is interval overlap.
///
/// Missing or undisclosed fields on either side contribute zero and are
/// never compared, so the result is symmetric in its arguments.
pub fn compatibility_score(
    a: &ProfileBundle,
    b: &ProfileBundle,
    weights: &ScoringWeights,
) -> CompatibilityResult {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    let (la, lb) = (a.lifestyle.as_ref(), b.lifestyle.as_ref());
    let (ha, hb) = (a.housing.as_ref(), b.housing.as_ref());
    let (pa, pb) = (a.preferences.as_ref(), b.preferences.as_ref());

    // Lifestyle scales, 1..=5
    if let (Some(x), Some(y)) = (la.and_then(|l| l.cleanliness), lb.and_then(|l| l.cleanliness)) {
        let factor = scale_closeness(x, y);
        score += factor * weights.cleanliness;
        if factor >= 0.75 {
            reasons.push("Similar cleanliness standards".to_string());
        }
    }

    if let (Some(x), Some(y)) = (
        la.and_then(|l| l.sleep_schedule),
        lb.and_then(|l| l.sleep_schedule),
    ) {
        let factor = sleep_alignment(x, y);
        score += factor * weights.sleep;
        if factor >= 1.0 {
            reasons.push("Matching sleep schedules".to_string());
        }
    }

    if let (Some(x), Some(y)) = (
        la.and_then(|l| l.noise_tolerance),
        lb.and_then(|l| l.noise_tolerance),
    ) {
        score += scale_closeness(x, y) * weights.noise;
    }

    if let (Some(x), Some(y)) = (
        la.and_then(|l| l.guest_frequency),
        lb.and_then(|l| l.guest_frequency),
    ) {
        score += scale_closeness(x, y) * weights.guests;
    }

    if let (Some(x), Some(y)) = (la.and_then(|l| l.smoking), lb.and_then(|l| l.smoking)) {
        if x == y {
            score += weights.smoking;
            if !x {
                reasons.push("Both smoke-free".to_string());
            }
        }
    }

    if let (Some(x), Some(y)) = (la.and_then(|l| l.pets), lb.and_then(|l| l.pets)) {
        if x == y {
            score += weights.pets;
            if x {
                reasons.push("Both pet-friendly".to_string());
            }
        }
    }

    // Preference overlaps
    if let (Some(x), Some(y)) = (pa, pb) {
        let (factor, _) = set_overlap(&x.dietary, &y.dietary);
        if factor > 0.0 {
            score += factor * weights.dietary;
            if factor >= 0.5 {
                reasons.push("Compatible dietary habits".to_string());
            }
        }

        let (factor, shared) = set_overlap(&x.hobbies, &y.hobbies);
        if factor > 0.0 {
            score += factor * weights.hobbies;
            if !shared.is_empty() {
                reasons.push(format!("You both enjoy {}", shared.join(", ")));
            }
        }

        let (factor, _) = set_overlap(&x.languages, &y.languages);
        if factor > 0.0 {
            score += factor * weights.languages;
        }
    }

    // Housing: budget interval and target neighborhoods
    if let (Some(x), Some(y)) = (ha, hb) {
        if let Some(factor) = budget_overlap(x.budget_min, x.budget_max, y.budget_min, y.budget_max)
        {
            score += factor * weights.budget;
            if factor >= 0.5 {
                reasons.push("Budgets overlap".to_string());
            }
        }

        let (factor, shared) = set_overlap(&x.neighborhoods, &y.neighborhoods);
        if factor > 0.0 {
            score += factor * weights.neighborhood;
            if !shared.is_empty() {
                reasons.push(format!("Both looking in {}", shared.join(", ")));
            }
        }
    }

    CompatibilityResult {
        score: score.clamp(0.0, 100.0),
        reasons,
    }
}

/// Arithmetic mean of pairwise scores, `None` for fewer than two.
pub fn average_compatibility(pairwise_scores: &[f64]) -> Option<f64> {
    if pairwise_scores.is_empty() {
        return None;
    }
    Some(pairwise_scores.iter().sum::<f64>() / pairwise_scores.len() as f64)
}

/// Closeness on a 1..=5 scale (0-1)
#[inline]
fn scale_closeness(a: u8, b: u8) -> f64 {
    let diff = (a as f64 - b as f64).abs();
    (1.0 - diff / 4.0).max(0.0)
}

/// Sleep schedule alignment (0-1). Flexible sleepers half-match
/// everyone.
#[inline]
fn sleep_alignment(a: SleepSchedule, b: SleepSchedule) -> f64 {
    if a == b {
        1.0
    } else if a == SleepSchedule::Flexible || b == SleepSchedule::Flexible {
        0.5
    } else {
        0.0
    }
}

/// Overlap factor (0-1) and the shared items, sorted so the result is
/// identical regardless of argument order. Empty lists are undisclosed
/// and score nothing.
fn set_overlap(a: &[String], b: &[String]) -> (f64, Vec<String>) {
    if a.is_empty() || b.is_empty() {
        return (0.0, Vec::new());
    }

    let mut shared: Vec<String> = a
        .iter()
        .filter(|item| b.contains(item))
        .cloned()
        .collect();
    shared.sort();
    shared.dedup();

    let smaller = a.len().min(b.len()) as f64;
    let factor = (shared.len() as f64 / smaller).min(1.0);
    (factor, shared)
}

/// Interval overlap of two budget ranges (0-1), `None` when either side
/// left its range undisclosed or inverted.
fn budget_overlap(
    a_min: Option<u32>,
    a_max: Option<u32>,
    b_min: Option<u32>,
    b_max: Option<u32>,
) -> Option<f64> {
    let (a_min, a_max, b_min, b_max) = (a_min?, a_max?, b_min?, b_max?);
    if a_max < a_min || b_max < b_min {
        return None;
    }

    let low = a_min.max(b_min);
    let high = a_max.min(b_max);
    if high < low {
        return Some(0.0);
    }

    let overlap = (high - low) as f64;
    let shorter = ((a_max - a_min).min(b_max - b_min)) as f64;
    if shorter <= 0.0 {
        // Point ranges that touch count as full overlap
        return Some(1.0);
    }
    Some((overlap / shorter).min(1.0))
}
