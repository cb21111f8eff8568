use serde::Serialize;
use std::sync::Arc;

use crate::{
    constants::MAX_WRITE_ATTEMPTS,
    db::Store,
    error::{AppError, Result},
    models::UserProgress,
    services::achievements::{
        find_tutorial, tutorial_points, unlock_satisfied, Achievement, ACHIEVEMENTS,
    },
    utils::normalize_address,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
    pub success: bool,
    pub message: String,
    pub tutorial_points: u64,
    pub points_earned: u64,
    pub new_achievements: Vec<Achievement>,
    pub progress: UserProgress,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementStatus {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementsView {
    pub progress: UserProgress,
    pub achievements: Vec<AchievementStatus>,
    pub newly_unlocked: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_address: String,
    pub total_points: u64,
    pub tutorials_completed: usize,
    pub achievements_unlocked: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
    pub total_users: usize,
}

#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn Store>,
}

impl ProgressService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records a tutorial completion, awards its points and unlocks achievements.
    /// Completing the same tutorial twice leaves the document untouched.
    pub async fn complete_tutorial(
        &self,
        user_address: &str,
        tutorial_id: &str,
        quiz_score: i64,
    ) -> Result<CompletionOutcome> {
        let user_address = normalize_address(user_address)?;
        let tutorial = find_tutorial(tutorial_id.trim())
            .ok_or_else(|| AppError::BadRequest(format!("Unknown tutorial: {}", tutorial_id)))?;
        let quiz_score = u8::try_from(quiz_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                AppError::BadRequest("quizScore must be between 0 and 100".to_string())
            })?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut progress = self.store.load_progress(&user_address).await?;
            if progress.has_completed(tutorial.id) {
                return Ok(CompletionOutcome {
                    success: false,
                    message: "Tutorial already completed".to_string(),
                    tutorial_points: 0,
                    points_earned: 0,
                    new_achievements: Vec::new(),
                    progress,
                });
            }

            let earned = tutorial_points(tutorial, quiz_score);
            let before = progress.total_points;
            progress.tutorials_completed.push(tutorial.id.to_string());
            progress
                .quiz_scores
                .insert(tutorial.id.to_string(), quiz_score);
            progress.total_points += earned;
            let unlocked = unlock_satisfied(&mut progress);

            if self.store.save_progress(&progress).await? {
                progress.version += 1;
                tracing::info!(
                    "{} completed {} (quiz {}%): +{} points, {} achievement(s)",
                    user_address,
                    tutorial.id,
                    quiz_score,
                    progress.total_points - before,
                    unlocked.len()
                );
                return Ok(CompletionOutcome {
                    success: true,
                    message: format!("Completed \"{}\"", tutorial.title),
                    tutorial_points: earned,
                    points_earned: progress.total_points - before,
                    new_achievements: unlocked.into_iter().cloned().collect(),
                    progress,
                });
            }
            tracing::debug!(
                "Progress for {} changed concurrently (attempt {})",
                user_address,
                attempt
            );
        }
        Err(AppError::Conflict(
            "Progress is being updated elsewhere, please retry".to_string(),
        ))
    }

    /// Returns progress with the achievement catalog, unlocking anything newly satisfied.
    pub async fn achievements(&self, user_address: &str) -> Result<AchievementsView> {
        let user_address = normalize_address(user_address)?;

        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut progress = self.store.load_progress(&user_address).await?;
            let unlocked = unlock_satisfied(&mut progress);
            if !unlocked.is_empty() {
                if !self.store.save_progress(&progress).await? {
                    tracing::debug!(
                        "Progress for {} changed concurrently (attempt {})",
                        user_address,
                        attempt
                    );
                    continue;
                }
                progress.version += 1;
                tracing::info!(
                    "{} unlocked {} achievement(s) on read",
                    user_address,
                    unlocked.len()
                );
            }

            let achievements = ACHIEVEMENTS
                .iter()
                .map(|a| AchievementStatus {
                    achievement: a.clone(),
                    unlocked: progress.has_unlocked(a.id),
                })
                .collect();
            return Ok(AchievementsView {
                newly_unlocked: unlocked.iter().map(|a| a.id.to_string()).collect(),
                achievements,
                progress,
            });
        }
        Err(AppError::Conflict(
            "Progress is being updated elsewhere, please retry".to_string(),
        ))
    }

    pub async fn leaderboard(&self, limit: u32) -> Result<Leaderboard> {
        let rows = self.store.top_progress(limit).await?;
        let total_users = self.store.count_users().await?;
        let entries = rows
            .into_iter()
            .enumerate()
            .map(|(idx, progress)| LeaderboardEntry {
                rank: idx + 1,
                user_address: progress.user_address,
                total_points: progress.total_points,
                tutorials_completed: progress.tutorials_completed.len(),
                achievements_unlocked: progress.achievements_unlocked.len(),
            })
            .collect();
        Ok(Leaderboard {
            entries,
            total_users,
        })
    }
}
