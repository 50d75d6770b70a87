/// Liveness only, never touches the store.
pub async fn check() -> &'static str {
    "OK"
}
