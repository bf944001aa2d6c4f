//! フォーラムのスレッド同期エンジン
//!
//! 投稿ごとの返信ツリーとエンゲージメントカウンターを、楽観的なローカル更新・
//! キャッシュ付きの一覧取得・変更通知の 3 経路から一貫した状態に収束させる。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use state::AppState;

/// ログ設定の初期化
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_sync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_logging_can_be_called_repeatedly() {
        super::init_logging();
        super::init_logging();
        tracing::info!("logging initialised twice");
    }
}
