//! Progress rendering and publishing.
//!
//! [`ProgressRenderer`] turns a [`UserProgress`] into a README section and an
//! SVG stats card. [`ProgressPublisher`] writes both into the user's home
//! repository; publishing is best effort and only logs failures.

use std::f64::consts::PI;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::platform::{FileUpdate, RepoRef};
use crate::domain::models::{QuestCatalog, UserProgress};
use crate::domain::ports::RepositoryPlatform;

pub const README_PATH: &str = "README.md";
const CARD_RADIUS: f64 = 40.0;

/// Repository path of a user's stats card.
pub fn card_path(user: &str) -> String {
    format!("userCards/{user}.svg")
}

pub struct ProgressRenderer {
    catalog: Arc<QuestCatalog>,
}

impl ProgressRenderer {
    pub fn new(catalog: Arc<QuestCatalog>) -> Self {
        Self { catalog }
    }

    /// Quest map image for the user's position.
    ///
    /// `F.png` once every quest is done; otherwise `{quest}.png` before the
    /// first task, `{quest}{task}.png` mid-quest and `{quest}F.png` when all
    /// tasks of the quest are done.
    pub fn map_link(&self, progress: &UserProgress) -> String {
        let base = self.catalog.map_base_url.trim_end_matches('/');

        if self.catalog.quests.iter().all(|q| progress.has_completed(&q.id)) {
            return format!("{base}/F.png");
        }

        let Some(current) = &progress.current else {
            let upcoming = self
                .catalog
                .quests
                .iter()
                .find(|q| !progress.has_completed(&q.id))
                .map_or("Q1", |q| q.id.as_str());
            return format!("{base}/{upcoming}.png");
        };

        let quest = &current.quest;
        let (done, total) = progress
            .accepted
            .as_ref()
            .filter(|a| &a.quest == quest)
            .map_or((0, 0), |a| (a.completed_count(), a.tasks.len()));

        match &current.task {
            _ if done == 0 => format!("{base}/{quest}.png"),
            Some(task) if done < total => format!("{base}/{quest}{task}.png"),
            _ => format!("{base}/{quest}F.png"),
        }
    }

    /// README body: intro, stats card, finished quests, active quest
    /// checklist and quest map. `active_issue_url` is linked from the
    /// active task when known.
    pub fn render_readme(&self, progress: &UserProgress, active_issue_url: Option<&str>) -> String {
        let mut out = String::new();
        out.push_str(self.catalog.messages.readme_intro.trim_end());
        out.push_str("\n\n");
        let _ = writeln!(out, "User Stats:<br>\n![User Stats](/{})\n", card_path(&progress.id));

        for quest in &self.catalog.quests {
            if progress.has_completed(&quest.id) {
                let _ = writeln!(out, "  - ~{}~", quest.title);
            }
        }
        out.push('\n');

        if let Some(accepted) = &progress.accepted {
            if let Some(quest) = self.catalog.quest(&accepted.quest) {
                let active = progress
                    .current
                    .as_ref()
                    .filter(|c| c.quest == accepted.quest)
                    .and_then(|c| c.task.as_ref());

                let _ = writeln!(out, "Quest:\n  - {}", quest.title);
                for (index, task) in quest.tasks.iter().enumerate() {
                    let number = index + 1;
                    let completed = accepted.tasks.get(&task.id).is_some_and(|s| s.completed);
                    if completed {
                        let _ = writeln!(out, "    - ~Task {number} - {}~ [COMPLETED]", task.title);
                    } else if active == Some(&task.id) {
                        match active_issue_url {
                            Some(url) => {
                                let _ = writeln!(
                                    out,
                                    "    - Task {number} - {} [[Click here to start]({url})]",
                                    task.title
                                );
                            }
                            None => {
                                let _ = writeln!(out, "    - Task {number} - {} ⬅️", task.title);
                            }
                        }
                    } else {
                        let _ = writeln!(out, "    - Task {number} - {}", task.title);
                    }
                }
            }
        }

        let _ = write!(out, "\nQuests Map:\n![Quest Map]({})\n", self.map_link(progress));
        out
    }

    /// SVG card with a completion ring, quests completed, points and level.
    pub fn render_card(&self, progress: &UserProgress) -> String {
        let percentage = (progress.completion * 100.0).round();
        let circumference = 2.0 * PI * CARD_RADIUS;
        let offset = circumference * (1.0 - percentage / 100.0);

        format!(
            r##"<svg width="450" height="195" viewBox="0 0 450 195" fill="none" xmlns="http://www.w3.org/2000/svg" role="img" aria-labelledby="titleId">
  <title id="titleId">{user}'s Quest Stats, Level: {level}</title>
  <style>
    .header {{ font: 600 18px 'Segoe UI', Ubuntu, Sans-Serif; fill: #ffffff; }}
    .stat {{ font: 600 14px 'Segoe UI', Ubuntu, Sans-Serif; fill: #ffffff; }}
    .rank-text {{ font: 800 24px 'Segoe UI', Ubuntu, Sans-Serif; fill: #ffffff; }}
    .rank-circle-rim {{ stroke: #2f80ed; fill: none; stroke-width: 6; opacity: 0.2; }}
    .rank-circle {{ stroke: #2f80ed; stroke-dasharray: {circumference:.2}; stroke-dashoffset: {offset:.2}; fill: none; stroke-width: 6; stroke-linecap: round; opacity: 0.8; transform-origin: -10px 8px; transform: rotate(-90deg); }}
  </style>
  <rect x="0.5" y="0.5" rx="4.5" height="99%" width="449" stroke="#e4e2e2" fill="#21262d" />
  <text x="25" y="35" class="header">{user}'s Quest Stats</text>
  <g transform="translate(365, 85)">
    <circle class="rank-circle-rim" cx="-10" cy="8" r="{radius}" />
    <circle class="rank-circle" cx="-10" cy="8" r="{radius}" />
    <text x="-10" y="8" class="rank-text" text-anchor="middle" dominant-baseline="central">{percentage}%</text>
  </g>
  <g transform="translate(25, 55)">
    <text class="stat" y="12.5">Quests Completed:</text>
    <text class="stat" x="199" y="12.5">{quests}</text>
    <text class="stat" y="37.5">Total Points:</text>
    <text class="stat" x="199" y="37.5">{points}</text>
    <text class="stat" y="62.5">Level:</text>
    <text class="stat" x="199" y="62.5">{level}</text>
  </g>
</svg>
"##,
            user = escape_xml(&progress.id),
            level = progress.level(),
            radius = CARD_RADIUS,
            quests = progress.completed.len(),
            points = progress.points,
        )
    }

    pub fn default_readme(&self) -> &str {
        &self.catalog.messages.default_readme
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&apos;")
        .replace('"', "&quot;")
}

/// Writes rendered progress into a home repository.
pub struct ProgressPublisher<P: RepositoryPlatform> {
    platform: Arc<P>,
    renderer: ProgressRenderer,
}

impl<P: RepositoryPlatform> ProgressPublisher<P> {
    pub fn new(platform: Arc<P>, catalog: Arc<QuestCatalog>) -> Self {
        Self {
            platform,
            renderer: ProgressRenderer::new(catalog),
        }
    }

    pub fn renderer(&self) -> &ProgressRenderer {
        &self.renderer
    }

    /// Refresh the stats card and README. Failures are logged.
    pub async fn publish(&self, home: &RepoRef, progress: &UserProgress, active_issue_url: Option<&str>) {
        let card = self.renderer.render_card(progress);
        let path = card_path(&progress.id);
        if let Err(e) = self.write_file(home, &path, card, format!("Update {path}")).await {
            tracing::warn!(repo = %home, user = %progress.id, error = %e, "failed to publish stats card");
        }

        let readme = self.renderer.render_readme(progress, active_issue_url);
        match self
            .write_file(home, README_PATH, readme, "Update README.md".to_string())
            .await
        {
            Ok(()) => tracing::debug!(repo = %home, user = %progress.id, "published progress README"),
            Err(e) => tracing::warn!(repo = %home, user = %progress.id, error = %e, "failed to publish README"),
        }
    }

    /// Restore the default README. Failures are logged.
    pub async fn reset_readme(&self, home: &RepoRef) {
        let content = self.renderer.default_readme().to_string();
        if let Err(e) = self
            .write_file(home, README_PATH, content, "Reset README.md".to_string())
            .await
        {
            tracing::warn!(repo = %home, error = %e, "failed to reset README");
        }
    }

    async fn write_file(&self, home: &RepoRef, path: &str, content: String, message: String) -> DomainResult<()> {
        let sha = self.platform.get_file_sha(home, path).await?;
        let update = FileUpdate {
            path: path.to_string(),
            content,
            message,
            sha,
        };
        self.platform.put_file(home, &update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockPlatform;
    use crate::domain::models::{QuestId, TaskId};
    use crate::infrastructure::templates::catalog_loader::default_catalog;

    const MAPS: &str = "https://raw.githubusercontent.com/ossdoorway/quest-maps/main";

    fn renderer() -> ProgressRenderer {
        ProgressRenderer::new(default_catalog().unwrap())
    }

    fn advanced(tasks: &[&str]) -> UserProgress {
        let catalog = default_catalog().unwrap();
        let mut progress = UserProgress::new("octocat");
        progress.accept_quest(&catalog, &QuestId::from("Q1")).unwrap();
        for task in tasks {
            progress
                .complete_task(&catalog, &QuestId::from("Q1"), &TaskId::from(*task), false)
                .unwrap();
        }
        progress
    }

    #[test]
    fn test_map_link_follows_progress() {
        let r = renderer();
        assert_eq!(r.map_link(&UserProgress::new("octocat")), format!("{MAPS}/Q1.png"));
        assert_eq!(r.map_link(&advanced(&[])), format!("{MAPS}/Q1.png"));
        assert_eq!(r.map_link(&advanced(&["T1"])), format!("{MAPS}/Q1T2.png"));
        assert_eq!(
            r.map_link(&advanced(&["T1", "T2", "T3", "T4", "T5"])),
            format!("{MAPS}/Q1F.png")
        );

        let mut finished = UserProgress::new("octocat");
        finished.completed = vec![QuestId::from("Q1"), QuestId::from("Q2"), QuestId::from("Q3")];
        assert_eq!(r.map_link(&finished), format!("{MAPS}/F.png"));
    }

    #[test]
    fn test_readme_marks_completed_and_active_tasks() {
        let progress = advanced(&["T1", "T2"]);
        let readme = renderer().render_readme(&progress, Some("https://github.com/o/r/issues/4"));

        assert!(readme.contains("![User Stats](/userCards/octocat.svg)"));
        assert!(readme.contains("~Task 1 - Explore the issue tracker~ [COMPLETED]"));
        assert!(readme.contains("[[Click here to start](https://github.com/o/r/issues/4)]"));
        assert!(readme.contains(&format!("![Quest Map]({MAPS}/Q1T3.png)")));
    }

    #[test]
    fn test_readme_strikes_completed_quests() {
        let mut progress = UserProgress::new("octocat");
        progress.completed = vec![QuestId::from("Q1")];
        let readme = renderer().render_readme(&progress, None);
        assert!(readme.contains("  - ~Quest 1 - Exploring the GitHub World~"));
    }

    #[test]
    fn test_card_shows_stats() {
        let mut progress = advanced(&["T1", "T2", "T3"]);
        progress.xp = 250;
        let card = renderer().render_card(&progress);

        assert!(card.starts_with("<svg"));
        assert!(card.contains(">60%</text>"));
        assert!(card.contains("Level: 3"));
        assert!(card.contains(&format!(">{}</text>", progress.points)));
    }

    #[tokio::test]
    async fn test_publish_writes_card_and_readme_twice() {
        let platform = MockPlatform::new();
        let home = RepoRef::new("octocat", "home");
        let publisher = ProgressPublisher::new(Arc::new(platform.clone()), default_catalog().unwrap());

        let progress = advanced(&["T1"]);
        publisher.publish(&home, &progress, None).await;
        publisher.publish(&home, &progress, None).await;

        assert_eq!(platform.file_writes().await, 4);
        assert!(platform.file(&home, "userCards/octocat.svg").await.is_some());

        publisher.reset_readme(&home).await;
        let readme = platform.file(&home, README_PATH).await.unwrap();
        assert!(readme.contains("#### Commands"));
    }
}
