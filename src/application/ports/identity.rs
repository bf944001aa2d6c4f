/// 現在のユーザーを返す認証境界
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}
