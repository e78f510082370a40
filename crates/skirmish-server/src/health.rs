/// Liveness probe. Plain body by contract with deploy tooling.
pub async fn health_check() -> &'static str {
    "OK"
}
