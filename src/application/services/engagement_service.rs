use crate::application::ports::repositories::EngagementRepository;
use crate::domain::entities::{EngagementTarget, EngagementToggle, ToggleOutcome};
use crate::domain::value_objects::EngagementKind;
use crate::shared::error::AppError;
use std::sync::Arc;
use tracing::{debug, error, info};

/// ユーザー単位のいいね・アップボートの切り替え
pub struct EngagementService {
    repository: Arc<dyn EngagementRepository>,
}

impl EngagementService {
    pub fn new(repository: Arc<dyn EngagementRepository>) -> Self {
        Self { repository }
    }

    /// トグル行の有無を反転し、対象のカウンターを ±1 する
    ///
    /// 別タブとの競合で行の作成・削除が空振りした場合は、カウンターは動かさず現在値を読み直す。
    pub async fn toggle(
        &self,
        target: &EngagementTarget,
        kind: EngagementKind,
        user_id: &str,
    ) -> Result<ToggleOutcome, AppError> {
        if !kind.supports(target.target_type) {
            return Err(AppError::ValidationError(format!(
                "{} is not supported for {}",
                kind, target.target_type
            )));
        }

        // 対象が存在しなければ何も書き込まない
        self.current_count(target, kind).await?;

        let existing = self
            .repository
            .find_toggle(user_id, target.target_type, &target.target_id, kind)
            .await?;

        let (active, new_count) = match existing {
            None => {
                let toggle = EngagementToggle::new(user_id.to_string(), target, kind);
                if self.repository.create_toggle(&toggle).await? {
                    match self.adjust(target, kind, 1).await {
                        Ok(count) => (true, count),
                        Err(e) => {
                            self.undo_create(&toggle).await;
                            return Err(e);
                        }
                    }
                } else {
                    debug!(
                        "Toggle row already created for {} {} by {}",
                        target.target_type, target.target_id, user_id
                    );
                    (true, self.current_count(target, kind).await?)
                }
            }
            Some(existing) => {
                let deleted = self
                    .repository
                    .delete_toggle(user_id, target.target_type, &target.target_id, kind)
                    .await?;
                if deleted {
                    match self.adjust(target, kind, -1).await {
                        Ok(count) => (false, count),
                        Err(e) => {
                            self.undo_delete(&existing).await;
                            return Err(e);
                        }
                    }
                } else {
                    debug!(
                        "Toggle row already removed for {} {} by {}",
                        target.target_type, target.target_id, user_id
                    );
                    (false, self.current_count(target, kind).await?)
                }
            }
        };

        info!(
            "{} {} on {} {} -> {} ({})",
            user_id,
            if active { "added" } else { "removed" },
            target.target_type,
            target.target_id,
            kind,
            new_count
        );

        Ok(ToggleOutcome {
            target_type: target.target_type,
            target_id: target.target_id.clone(),
            kind,
            active,
            new_count,
        })
    }

    /// カウンター更新に失敗したとき、作成したトグル行を消して行数とカウンターを揃える
    async fn undo_create(&self, toggle: &EngagementToggle) {
        match self
            .repository
            .delete_toggle(
                &toggle.user_id,
                toggle.target_type,
                &toggle.target_id,
                toggle.kind,
            )
            .await
        {
            Ok(_) => debug!(
                "Reverted toggle row for {} {} by {}",
                toggle.target_type, toggle.target_id, toggle.user_id
            ),
            Err(e) => error!(
                "Failed to revert toggle row for {} {} by {}: {}",
                toggle.target_type, toggle.target_id, toggle.user_id, e
            ),
        }
    }

    async fn undo_delete(&self, toggle: &EngagementToggle) {
        match self.repository.create_toggle(toggle).await {
            Ok(_) => debug!(
                "Restored toggle row for {} {} by {}",
                toggle.target_type, toggle.target_id, toggle.user_id
            ),
            Err(e) => error!(
                "Failed to restore toggle row for {} {} by {}: {}",
                toggle.target_type, toggle.target_id, toggle.user_id, e
            ),
        }
    }

    async fn adjust(
        &self,
        target: &EngagementTarget,
        kind: EngagementKind,
        delta: i64,
    ) -> Result<u32, AppError> {
        self.repository
            .adjust_counter(target.target_type, &target.target_id, kind, delta)
            .await?
            .ok_or_else(|| not_found(target))
    }

    async fn current_count(
        &self,
        target: &EngagementTarget,
        kind: EngagementKind,
    ) -> Result<u32, AppError> {
        self.repository
            .get_counter(target.target_type, &target.target_id, kind)
            .await?
            .ok_or_else(|| not_found(target))
    }
}

fn not_found(target: &EngagementTarget) -> AppError {
    AppError::NotFound(format!("{} {}", target.target_type, target.target_id))
}
