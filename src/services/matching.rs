use serde::Serialize;
use std::collections::HashSet;

use crate::models::skills::SkillSet;
use crate::models::volunteer::Volunteer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    /// Required tokens the volunteer holds. Ranking only.
    pub matched_count: usize,
    /// Required tokens the volunteer lacks, case-folded, in requirement order.
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub volunteer: Volunteer,
    pub matched_count: usize,
}

/// Position-level rule.
///
/// With no requirement the volunteer only has to list `min_skill_count`
/// skills. Otherwise every required token must be held; extra skills and
/// the skill count are irrelevant.
pub fn is_eligible(volunteer: &SkillSet, required: &SkillSet, min_skill_count: usize) -> Eligibility {
    if required.is_empty() {
        return Eligibility {
            eligible: volunteer.len() >= min_skill_count,
            matched_count: 0,
            missing: Vec::new(),
        };
    }

    let held: HashSet<String> = volunteer.folded().collect();
    let (matched, missing): (Vec<String>, Vec<String>) = required.folded().partition(|token| held.contains(token));

    Eligibility {
        eligible: missing.is_empty(),
        matched_count: matched.len(),
        missing,
    }
}

/// Rule for joining an activity and for the dashboard: the skill-count
/// floor applies on top of the requirement check.
pub fn participation_eligibility(volunteer: &SkillSet, required: &SkillSet, min_skill_count: usize) -> Eligibility {
    let mut result = is_eligible(volunteer, required, min_skill_count);
    if volunteer.len() < min_skill_count {
        result.eligible = false;
    }
    result
}

/// Filters volunteers down to the eligible ones and orders them best fit
/// first. Ties keep the order the volunteers were given in.
pub fn rank_candidates(required: &SkillSet, volunteers: Vec<Volunteer>, min_skill_count: usize) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = volunteers
        .into_iter()
        .filter(|volunteer| !volunteer.skills.is_empty())
        .filter_map(|volunteer| {
            let result = is_eligible(&volunteer.skills, required, min_skill_count);
            result.eligible.then_some(Candidate {
                volunteer,
                matched_count: result.matched_count,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.matched_count.cmp(&a.matched_count));
    candidates
}
