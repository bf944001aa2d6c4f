//! 1 件の投稿とその返信ツリーをメモリ上で保持するスレッドストア。
//!
//! 返信はアリーナ（ID → 返信）と親キーごとの子インデックスで管理する。
//! 挿入は ID で冪等、カウンター更新は絶対値で行うため、楽観的更新と
//! リアルタイムフィードのエコーがどの順で届いても同じ状態に収束する。

mod store;
mod view;

pub use store::{InsertOutcome, ThreadStore};
pub use view::{ReplyView, ThreadView};
