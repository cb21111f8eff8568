//! Static tutorial and achievement catalogs and the unlock rules.

use serde::Serialize;

use crate::{
    constants::{PERFECT_QUIZ_BONUS_PERCENT, PERFECT_QUIZ_SCORE},
    models::UserProgress,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tutorial {
    pub id: &'static str,
    pub title: &'static str,
    pub difficulty: Difficulty,
    pub points: u64,
}

pub const TUTORIALS: &[Tutorial] = &[
    Tutorial {
        id: "what-is-base",
        title: "What is Base?",
        difficulty: Difficulty::Beginner,
        points: 100,
    },
    Tutorial {
        id: "base-wallet-setup",
        title: "Setting up a wallet on Base",
        difficulty: Difficulty::Beginner,
        points: 100,
    },
    Tutorial {
        id: "bridging-to-base",
        title: "Bridging assets to Base",
        difficulty: Difficulty::Intermediate,
        points: 150,
    },
    Tutorial {
        id: "base-defi-basics",
        title: "DeFi basics on Base",
        difficulty: Difficulty::Intermediate,
        points: 200,
    },
    Tutorial {
        id: "smart-contracts-on-base",
        title: "Smart contracts on Base",
        difficulty: Difficulty::Advanced,
        points: 250,
    },
    Tutorial {
        id: "base-security",
        title: "Staying safe on Base",
        difficulty: Difficulty::Intermediate,
        points: 150,
    },
];

pub fn find_tutorial(id: &str) -> Option<&'static Tutorial> {
    TUTORIALS.iter().find(|t| t.id == id)
}

/// Base points plus the perfect-score bonus (integer percent, rounded down).
pub fn tutorial_points(tutorial: &Tutorial, quiz_score: u8) -> u64 {
    if quiz_score == PERFECT_QUIZ_SCORE {
        tutorial.points + tutorial.points * PERFECT_QUIZ_BONUS_PERCENT / 100
    } else {
        tutorial.points
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Learning,
    Quiz,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    Count,
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    TutorialsCompleted,
    PerfectQuizzes,
    TotalPoints,
}

#[derive(Debug, Clone, Serialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementKind,
    pub target: u64,
    pub metric: Metric,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub points: u64,
    pub category: AchievementCategory,
    pub requirement: Requirement,
}

impl Achievement {
    pub fn check(&self, progress: &UserProgress) -> bool {
        let value = match self.requirement.metric {
            Metric::TutorialsCompleted => progress.tutorials_completed.len() as u64,
            Metric::PerfectQuizzes => progress.perfect_quiz_count(),
            Metric::TotalPoints => progress.total_points,
        };
        value >= self.requirement.target
    }
}

const fn count(metric: Metric, target: u64) -> Requirement {
    Requirement {
        kind: RequirementKind::Count,
        target,
        metric,
    }
}

const fn threshold(metric: Metric, target: u64) -> Requirement {
    Requirement {
        kind: RequirementKind::Threshold,
        target,
        metric,
    }
}

pub const ACHIEVEMENTS: &[Achievement] = &[
    Achievement {
        id: "first-tutorial",
        name: "First Steps",
        description: "Complete your first tutorial",
        points: 50,
        category: AchievementCategory::Learning,
        requirement: count(Metric::TutorialsCompleted, 1),
    },
    Achievement {
        id: "base-explorer",
        name: "Base Explorer",
        description: "Complete three tutorials",
        points: 150,
        category: AchievementCategory::Learning,
        requirement: count(Metric::TutorialsCompleted, 3),
    },
    Achievement {
        id: "base-master",
        name: "Base Master",
        description: "Complete every tutorial",
        points: 500,
        category: AchievementCategory::Learning,
        requirement: count(Metric::TutorialsCompleted, TUTORIALS.len() as u64),
    },
    Achievement {
        id: "perfect-score",
        name: "Perfect Score",
        description: "Score 100% on a tutorial quiz",
        points: 100,
        category: AchievementCategory::Quiz,
        requirement: count(Metric::PerfectQuizzes, 1),
    },
    Achievement {
        id: "quiz-champion",
        name: "Quiz Champion",
        description: "Score 100% on three tutorial quizzes",
        points: 300,
        category: AchievementCategory::Quiz,
        requirement: count(Metric::PerfectQuizzes, 3),
    },
    Achievement {
        id: "point-collector",
        name: "Point Collector",
        description: "Earn 500 points",
        points: 100,
        category: AchievementCategory::Milestone,
        requirement: threshold(Metric::TotalPoints, 500),
    },
    Achievement {
        id: "high-achiever",
        name: "High Achiever",
        description: "Earn 1500 points",
        points: 250,
        category: AchievementCategory::Milestone,
        requirement: threshold(Metric::TotalPoints, 1500),
    },
];

/// Checks every locked achievement once against the current counters and unlocks
/// the satisfied ones. Points awarded here do not feed back into this pass.
pub fn unlock_satisfied(progress: &mut UserProgress) -> Vec<&'static Achievement> {
    let unlocked: Vec<&'static Achievement> = ACHIEVEMENTS
        .iter()
        .filter(|a| !progress.has_unlocked(a.id) && a.check(progress))
        .collect();

    for achievement in &unlocked {
        progress.achievements_unlocked.push(achievement.id.to_string());
        progress.total_points += achievement.points;
    }
    unlocked
}
